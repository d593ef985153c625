//! Advisory escalation signal for free-text complaints.
//!
//! This check is an integration point, not an automatic trigger: `decide`
//! never calls it, and a caller that wants keyword escalation folds the
//! result into its risk signal explicitly.

/// Sentiment below this threshold flags the message for escalation.
pub const SENTIMENT_ESCALATION_THRESHOLD: f32 = -0.5;

/// Default complaint/keyword list carried by the platform. Includes the
/// Turkish-language phrases the marketplace audience actually types.
pub fn default_escalation_keywords() -> Vec<String> {
    [
        "gerçek kişi",
        "real person",
        "şikayet",
        "complaint",
        "para iade",
        "refund",
        "dolandırıcı",
        "scam",
        "bot musun",
        "are you a bot",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

/// Case-insensitive substring match against the keyword list, or a sentiment
/// score under the negative threshold.
pub fn should_escalate(message_text: &str, sentiment_score: f32, keywords: &[String]) -> bool {
    let text_lower = message_text.to_lowercase();
    if keywords
        .iter()
        .any(|keyword| !keyword.is_empty() && text_lower.contains(&keyword.to_lowercase()))
    {
        return true;
    }
    sentiment_score < SENTIMENT_ESCALATION_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_match_is_case_insensitive() {
        let keywords = default_escalation_keywords();
        assert!(should_escalate("I want a REFUND now", 0.0, &keywords));
        assert!(should_escalate("bot musun sen?", 0.5, &keywords));
        assert!(!should_escalate("hello there", 0.0, &keywords));
    }

    #[test]
    fn negative_sentiment_escalates_below_threshold() {
        let keywords = default_escalation_keywords();
        assert!(should_escalate("whatever", -0.51, &keywords));
        assert!(!should_escalate("whatever", -0.5, &keywords));
    }

    #[test]
    fn empty_keyword_entries_never_match() {
        let keywords = vec![String::new()];
        assert!(!should_escalate("anything at all", 0.0, &keywords));
    }
}
