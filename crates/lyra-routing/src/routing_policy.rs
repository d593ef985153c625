//! The routing rule table and the operator allocation step.
//!
//! `decide` evaluates rules top to bottom and the first match wins; rules are
//! never combined. Operator availability is applied afterwards in
//! `resolve_operator` so the mode/priority decision stays decoupled from
//! whoever happens to be online.

use serde::{Deserialize, Serialize};

use lyra_contract::{ConversationMode, ConversationPriority, VipTier};

#[derive(Debug, Clone, PartialEq)]
/// Tunable thresholds behind the rule table. Defaults are the documented
/// production values; tests pin these, not the risk model internals.
pub struct RoutePolicyConfig {
    pub high_value_risk_score: f32,
    pub medium_value_risk_score: f32,
    pub high_spender_threshold: i64,
    pub attention_spender_threshold: i64,
    /// Inclusive local-hour window where operators are presumed offline.
    pub night_window: (u8, u8),
}

impl Default for RoutePolicyConfig {
    fn default() -> Self {
        Self {
            high_value_risk_score: 0.7,
            medium_value_risk_score: 0.4,
            high_spender_threshold: 500,
            attention_spender_threshold: 50,
            night_window: (2, 6),
        }
    }
}

impl RoutePolicyConfig {
    pub fn is_night_hour(&self, hour_of_day: u8) -> bool {
        let (start, end) = self.night_window;
        hour_of_day >= start && hour_of_day <= end
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Inputs to a single routing decision.
pub struct RouteSignals {
    pub spend_total: i64,
    pub vip_tier: VipTier,
    pub risk_score: f32,
    pub operator_online: bool,
    pub current_mode: ConversationMode,
    pub message_count: i64,
    pub hour_of_day: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Outcome of the pure rule table, before operator allocation.
pub struct RouteDecision {
    pub mode: ConversationMode,
    pub priority: ConversationPriority,
    pub reason: String,
}

/// Evaluate the routing rule table. First matching rule wins.
pub fn decide(config: &RoutePolicyConfig, signals: &RouteSignals) -> RouteDecision {
    // Rule 1: an operator who took manual control is never overridden.
    if signals.current_mode == ConversationMode::Human {
        return RouteDecision {
            mode: ConversationMode::Human,
            priority: ConversationPriority::Vip,
            reason: "operator holds manual control".to_string(),
        };
    }

    // Rule 2: high value customers get a human.
    if signals.risk_score >= config.high_value_risk_score {
        return RouteDecision {
            mode: ConversationMode::Human,
            priority: ConversationPriority::Vip,
            reason: format!("high value customer (risk_score={:.2})", signals.risk_score),
        };
    }

    // Rule 3: VIP tiers get drafted-then-approved replies.
    if matches!(signals.vip_tier, VipTier::Gold | VipTier::Platinum) {
        return RouteDecision {
            mode: ConversationMode::HybridDraft,
            priority: ConversationPriority::Vip,
            reason: format!("vip tier customer ({})", signals.vip_tier.as_str()),
        };
    }

    // Rule 4: high spenders likewise.
    if signals.spend_total >= config.high_spender_threshold {
        return RouteDecision {
            mode: ConversationMode::HybridDraft,
            priority: ConversationPriority::High,
            reason: format!("high spender ({} total)", signals.spend_total),
        };
    }

    // Rule 5: night window, operators presumed unavailable.
    if config.is_night_hour(signals.hour_of_day) {
        return RouteDecision {
            mode: ConversationMode::Autonomous,
            priority: ConversationPriority::Normal,
            reason: "night hours, autonomous handling".to_string(),
        };
    }

    // Rule 6: medium value customers get drafts.
    if signals.risk_score >= config.medium_value_risk_score {
        return RouteDecision {
            mode: ConversationMode::HybridDraft,
            priority: ConversationPriority::High,
            reason: format!(
                "medium value customer (risk_score={:.2})",
                signals.risk_score
            ),
        };
    }

    // Rule 7: flagged for attention but not escalated.
    if signals.spend_total >= config.attention_spender_threshold {
        return RouteDecision {
            mode: ConversationMode::Autonomous,
            priority: ConversationPriority::High,
            reason: format!("attention spender ({} total)", signals.spend_total),
        };
    }

    // Rule 8: default.
    RouteDecision {
        mode: ConversationMode::Autonomous,
        priority: ConversationPriority::Normal,
        reason: "default autonomous routing".to_string(),
    }
}

/// Allocation source consulted after the mode decision. The current
/// implementation is a single slot ("assign someone"); pool load balancing
/// can replace this trait impl without touching the rule table.
pub trait OperatorAllocator {
    fn allocate(&self) -> Option<i64>;
}

impl<F> OperatorAllocator for F
where
    F: Fn() -> Option<i64>,
{
    fn allocate(&self) -> Option<i64> {
        self()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Routing outcome after operator allocation, including the explicit
/// downgrade marker when no operator was available for a mode that needs one.
pub struct ResolvedRoute {
    pub mode: ConversationMode,
    pub priority: ConversationPriority,
    pub operator_id: Option<i64>,
    pub downgraded: bool,
    pub reason: String,
}

/// Apply operator availability to a rule-table decision.
///
/// Modes that require an operator downgrade to autonomous when none can be
/// allocated. The downgrade is reported, never silent.
pub fn resolve_operator(
    decision: RouteDecision,
    allocator: &dyn OperatorAllocator,
) -> ResolvedRoute {
    if !decision.mode.requires_operator() {
        return ResolvedRoute {
            mode: decision.mode,
            priority: decision.priority,
            operator_id: None,
            downgraded: false,
            reason: decision.reason,
        };
    }

    match allocator.allocate() {
        Some(operator_id) => ResolvedRoute {
            mode: decision.mode,
            priority: decision.priority,
            operator_id: Some(operator_id),
            downgraded: false,
            reason: decision.reason,
        },
        None => ResolvedRoute {
            mode: ConversationMode::Autonomous,
            priority: decision.priority,
            operator_id: None,
            downgraded: true,
            reason: format!("{} (downgraded: no operator online)", decision.reason),
        },
    }
}
