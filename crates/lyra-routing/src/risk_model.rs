//! Replaceable customer value/risk scoring.
//!
//! The weights here are tunable parameters, not fixed law; routing tests pin
//! the documented rule-table thresholds instead of these internals.

use lyra_contract::VipTier;

#[derive(Debug, Clone, Copy, PartialEq)]
/// Inputs to a risk/value score in the 0.0–1.0 range.
pub struct RiskInput {
    pub spend_total: i64,
    pub vip_tier: VipTier,
    pub message_count: i64,
}

/// Trait contract for `RiskScorer` behavior.
pub trait RiskScorer: Send + Sync {
    fn score(&self, input: &RiskInput) -> f32;
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Default weighted-sum scorer.
pub struct WeightedRiskScorer {
    pub spend_weight: f32,
    pub spend_saturation: f32,
    pub tier_weight_gold: f32,
    pub tier_weight_silver: f32,
    pub engagement_weight: f32,
    pub engagement_saturation: f32,
}

impl Default for WeightedRiskScorer {
    fn default() -> Self {
        Self {
            spend_weight: 0.5,
            spend_saturation: 1_000.0,
            tier_weight_gold: 0.3,
            tier_weight_silver: 0.15,
            engagement_weight: 0.2,
            engagement_saturation: 100.0,
        }
    }
}

impl RiskScorer for WeightedRiskScorer {
    fn score(&self, input: &RiskInput) -> f32 {
        let spend_component =
            (input.spend_total.max(0) as f32 / self.spend_saturation).min(1.0) * self.spend_weight;
        let tier_component = match input.vip_tier {
            VipTier::Platinum | VipTier::Gold => self.tier_weight_gold,
            VipTier::Silver => self.tier_weight_silver,
            VipTier::None => 0.0,
        };
        let engagement_component = (input.message_count.max(0) as f32
            / self.engagement_saturation)
            .min(1.0)
            * self.engagement_weight;
        (spend_component + tier_component + engagement_component).clamp(0.0, 1.0)
    }
}
