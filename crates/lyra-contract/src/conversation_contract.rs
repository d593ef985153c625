use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const CONVERSATION_CONTRACT_SCHEMA_VERSION: u32 = 1;

pub const LYRA_ERROR_NOT_FOUND: &str = "lyra_not_found";
pub const LYRA_ERROR_INVALID_INPUT: &str = "lyra_invalid_input";
pub const LYRA_ERROR_INTERNAL: &str = "lyra_internal";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `Origin` values.
pub enum Origin {
    Marketplace,
    Messenger,
    Web,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Marketplace => "marketplace",
            Self::Messenger => "messenger",
            Self::Web => "web",
        }
    }

    /// Parse an origin tag; unrecognized tags are a contract error.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "marketplace" => Ok(Self::Marketplace),
            "messenger" => Ok(Self::Messenger),
            "web" => Ok(Self::Web),
            other => bail!("unsupported origin tag '{other}' (expected marketplace|messenger|web)"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `ConversationMode` values.
pub enum ConversationMode {
    Autonomous,
    Human,
    HybridDraft,
}

impl ConversationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Autonomous => "autonomous",
            Self::Human => "human",
            Self::HybridDraft => "hybrid_draft",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "autonomous" => Ok(Self::Autonomous),
            "human" => Ok(Self::Human),
            "hybrid_draft" => Ok(Self::HybridDraft),
            other => {
                bail!("unsupported conversation mode '{other}' (expected autonomous|human|hybrid_draft)")
            }
        }
    }

    /// True when the mode cannot make progress without an operator.
    pub fn requires_operator(self) -> bool {
        matches!(self, Self::Human | Self::HybridDraft)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `ConversationPriority` values.
pub enum ConversationPriority {
    Low,
    Normal,
    High,
    Vip,
}

impl ConversationPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Vip => "vip",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "vip" => Ok(Self::Vip),
            other => bail!("unsupported priority '{other}' (expected low|normal|high|vip)"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `SenderRole` values.
pub enum SenderRole {
    User,
    Agent,
    Operator,
}

impl SenderRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
            Self::Operator => "operator",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "agent" => Ok(Self::Agent),
            "operator" => Ok(Self::Operator),
            other => bail!("unsupported sender role '{other}' (expected user|agent|operator)"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `VipTier` values.
pub enum VipTier {
    #[default]
    None,
    Silver,
    Gold,
    Platinum,
}

impl VipTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Platinum => "platinum",
        }
    }

    /// Lossy parse: tier strings are cached advisory metadata from external
    /// platforms, so unknown values degrade to `None` instead of erroring.
    pub fn parse_lossy(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "silver" => Self::Silver,
            "gold" => Self::Gold,
            "platinum" => Self::Platinum,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
/// Optional customer metadata carried on an inbound message.
pub struct InboundMeta {
    #[serde(default)]
    pub spend_total: i64,
    #[serde(default)]
    pub vip_tier: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Public struct `InboundMessage` used across Lyra components.
pub struct InboundMessage {
    #[serde(default = "conversation_contract_schema_version")]
    pub schema_version: u32,
    pub origin: Origin,
    pub external_user_id: String,
    pub performer_id: i64,
    pub text: String,
    #[serde(default)]
    pub meta: Option<InboundMeta>,
}

fn conversation_contract_schema_version() -> u32 {
    CONVERSATION_CONTRACT_SCHEMA_VERSION
}

impl InboundMessage {
    /// Reject malformed input before any state mutation.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != CONVERSATION_CONTRACT_SCHEMA_VERSION {
            bail!(
                "unsupported inbound message schema version {} (expected {})",
                self.schema_version,
                CONVERSATION_CONTRACT_SCHEMA_VERSION
            );
        }
        if self.external_user_id.trim().is_empty() {
            bail!("external_user_id must be a non-empty string");
        }
        if self.performer_id <= 0 {
            bail!("performer_id must be a positive identifier");
        }
        if self.text.trim().is_empty() {
            bail!("text must be a non-empty string");
        }
        if let Some(meta) = &self.meta {
            if meta.spend_total < 0 {
                bail!("meta.spend_total must not be negative");
            }
        }
        Ok(())
    }
}
