use lyra_store::PerformerRecord;

/// Default persona instruction used when a performer has no stored prompt.
pub fn default_system_prompt(label: &str) -> String {
    format!(
        "You are {label}, a persona performer on a chat platform. Stay in \
         character, keep replies short (two or three sentences), be warm and \
         playful, and never share real identity details, off-platform contact \
         information, or payment requests."
    )
}

#[derive(Debug, Clone, PartialEq)]
/// Persona configuration fed to the reply generator.
pub struct PersonaConfig {
    pub label: String,
    pub model: String,
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl PersonaConfig {
    pub fn from_performer(performer: &PerformerRecord) -> Self {
        let system_prompt = performer
            .system_prompt
            .clone()
            .unwrap_or_else(|| default_system_prompt(&performer.label));
        Self {
            label: performer.label.clone(),
            model: performer.model.clone(),
            system_prompt,
            temperature: performer.temperature as f32,
            max_tokens: performer.max_tokens.clamp(1, 4_096) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_prompt_wins_over_default() {
        let performer = PerformerRecord {
            id: 1,
            label: "Vela".to_string(),
            agent_id: "vela_v1".to_string(),
            provider: "openai_compat".to_string(),
            model: "grok-3-latest".to_string(),
            system_prompt: Some("Custom prompt".to_string()),
            temperature: 0.7,
            max_tokens: 150,
            is_active: true,
        };
        let persona = PersonaConfig::from_performer(&performer);
        assert_eq!(persona.system_prompt, "Custom prompt");
        assert_eq!(persona.max_tokens, 150);

        let mut bare = performer;
        bare.system_prompt = None;
        let persona = PersonaConfig::from_performer(&bare);
        assert!(persona.system_prompt.contains("Vela"));
    }
}
