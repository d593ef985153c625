//! Routing decisions for inbound conversations.
//!
//! Everything in this crate is pure computation: the rule table in
//! `routing_policy`, the replaceable risk model, and the advisory escalation
//! check never touch I/O, so routing behavior is fully determined by its
//! inputs.

pub mod escalation;
pub mod risk_model;
pub mod routing_policy;

pub use escalation::{default_escalation_keywords, should_escalate, SENTIMENT_ESCALATION_THRESHOLD};
pub use risk_model::{RiskInput, RiskScorer, WeightedRiskScorer};
pub use routing_policy::{
    decide, resolve_operator, OperatorAllocator, ResolvedRoute, RouteDecision, RoutePolicyConfig,
    RouteSignals,
};
