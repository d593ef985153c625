//! Persona reply generation with an always-answer fallback policy.
//!
//! Provider unavailability and provider failure both resolve to a usable
//! reply, but with distinct source tags so observability can tell "never
//! configured" apart from "actively failing."

use std::sync::Arc;

use anyhow::Result;

use lyra_ai::{ChatMessage, ChatRequest, LlmClient};
use lyra_contract::SenderRole;
use lyra_store::ConversationStore;

use crate::PersonaConfig;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `ReplySource` values.
pub enum ReplySource {
    Provider,
    Mock,
    ErrorFallback,
}

impl ReplySource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::Mock => "mock",
            Self::ErrorFallback => "error_fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Public struct `AgentReply` used across Lyra components.
pub struct AgentReply {
    pub text: String,
    pub tokens_used: u64,
    pub model_used: String,
    pub source: ReplySource,
}

/// Generates persona replies from bounded conversation context.
pub struct ReplyGenerator {
    client: Option<Arc<dyn LlmClient>>,
    history_limit: usize,
}

impl ReplyGenerator {
    pub fn new(client: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            client,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit.max(1);
        self
    }

    /// Generate a reply for the conversation. Only storage failures
    /// propagate; every provider-side condition resolves to a reply.
    pub async fn generate(
        &self,
        store: &ConversationStore,
        conversation_id: i64,
        incoming_text: &str,
        persona: &PersonaConfig,
    ) -> Result<AgentReply> {
        let Some(client) = &self.client else {
            return Ok(mock_reply(persona));
        };

        let history = store.recent_history(conversation_id, self.history_limit)?;
        let mut messages = vec![ChatMessage::system(persona.system_prompt.clone())];
        for record in &history {
            // Drafts were never shown to the user; they are not context.
            if record.is_draft {
                continue;
            }
            let message = match record.sender {
                SenderRole::User => ChatMessage::user(record.text.clone()),
                SenderRole::Agent | SenderRole::Operator => {
                    ChatMessage::assistant(record.text.clone())
                }
            };
            messages.push(message);
        }
        let already_recorded = history
            .last()
            .map(|record| record.sender == SenderRole::User && record.text == incoming_text)
            .unwrap_or(false);
        if !already_recorded {
            messages.push(ChatMessage::user(incoming_text.to_string()));
        }

        let request = ChatRequest {
            model: persona.model.clone(),
            messages,
            max_tokens: Some(persona.max_tokens),
            temperature: Some(persona.temperature),
        };

        match client.complete(request).await {
            Ok(completion) => Ok(AgentReply {
                text: completion.text,
                tokens_used: completion.usage.total_tokens,
                model_used: completion.model,
                source: ReplySource::Provider,
            }),
            Err(error) => {
                tracing::warn!(
                    conversation_id,
                    persona = %persona.label,
                    %error,
                    "provider call failed, serving fallback reply"
                );
                Ok(error_fallback_reply(persona))
            }
        }
    }
}

fn mock_reply(persona: &PersonaConfig) -> AgentReply {
    AgentReply {
        text: format!(
            "Hey, it's {}! I'm caught up in something right now, but I'll be \
             back with you in a moment 💋",
            persona.label
        ),
        tokens_used: 0,
        model_used: ReplySource::Mock.as_str().to_string(),
        source: ReplySource::Mock,
    }
}

fn error_fallback_reply(_persona: &PersonaConfig) -> AgentReply {
    AgentReply {
        text: "Give me one second, I'll be right back… 💫".to_string(),
        tokens_used: 0,
        model_used: ReplySource::ErrorFallback.as_str().to_string(),
        source: ReplySource::ErrorFallback,
    }
}
