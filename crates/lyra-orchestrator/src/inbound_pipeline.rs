//! The inbound message pipeline.
//!
//! One entry point, `Orchestrator::handle_inbound`, carries a platform
//! message through identity resolution, persistence, routing, and reply
//! dispatch. Routing itself stays pure; this module gathers the signals,
//! calls the rule table, and persists whatever it decided.

use std::sync::Arc;

use serde::Serialize;

use lyra_agent::{PersonaConfig, ReplyGenerator};
use lyra_contract::{ConversationMode, ConversationPriority, InboundMessage, SenderRole, VipTier};
use lyra_outbound::{OutboundJob, OutboundQueue};
use lyra_routing::{
    decide, resolve_operator, RiskInput, RiskScorer, RoutePolicyConfig, RouteSignals,
    WeightedRiskScorer,
};
use lyra_store::{Conversation, ConversationStore, NewMessage, PerformerRecord};

use crate::OrchestratorError;

type HourSource = Box<dyn Fn() -> u8 + Send + Sync>;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// What `handle_inbound` resolved to, shaped for the gateway response.
pub struct InboundOutcome {
    pub conversation_id: i64,
    pub mode: ConversationMode,
    pub priority: ConversationPriority,
    /// The agent reply sent back to the user, when the conversation was
    /// handled autonomously. Draft and human modes produce no user-visible
    /// reply here.
    pub reply: Option<String>,
    pub queued_for_operator: bool,
    pub operator_downgraded: bool,
}

/// Coordinates the store, routing policy, reply generator, and outbound
/// queue behind a single inbound entry point.
pub struct Orchestrator {
    store: Arc<ConversationStore>,
    outbound: Arc<OutboundQueue>,
    replies: ReplyGenerator,
    policy: RoutePolicyConfig,
    risk_scorer: Box<dyn RiskScorer>,
    hour_source: HourSource,
}

impl Orchestrator {
    pub fn new(
        store: Arc<ConversationStore>,
        outbound: Arc<OutboundQueue>,
        replies: ReplyGenerator,
    ) -> Self {
        Self {
            store,
            outbound,
            replies,
            policy: RoutePolicyConfig::default(),
            risk_scorer: Box::new(WeightedRiskScorer::default()),
            hour_source: Box::new(lyra_core::current_hour_of_day),
        }
    }

    pub fn with_policy(mut self, policy: RoutePolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_risk_scorer(mut self, risk_scorer: Box<dyn RiskScorer>) -> Self {
        self.risk_scorer = risk_scorer;
        self
    }

    /// Override the wall-clock hour, primarily so tests can pin the night
    /// window without depending on when they run.
    pub fn with_hour_source<F>(mut self, hour_source: F) -> Self
    where
        F: Fn() -> u8 + Send + Sync + 'static,
    {
        self.hour_source = Box::new(hour_source);
        self
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn outbound(&self) -> &OutboundQueue {
        &self.outbound
    }

    /// Process one inbound platform message end to end.
    pub async fn handle_inbound(
        &self,
        message: InboundMessage,
    ) -> Result<InboundOutcome, OrchestratorError> {
        message
            .validate()
            .map_err(|error| OrchestratorError::InvalidInput(error.to_string()))?;

        let performer = self.lookup_performer(message.performer_id)?;
        let user_id = self
            .store
            .resolve_or_create_identity(message.origin, &message.external_user_id)?;
        self.apply_cached_stats(&message)?;

        let conversation = self.store.find_or_create_active(
            user_id,
            performer.id,
            message.origin,
            &message.external_user_id,
            &performer.agent_id,
        )?;

        self.store.append_message(NewMessage {
            conversation_id: conversation.id,
            sender: SenderRole::User,
            text: message.text.clone(),
            channel: message.origin.as_str().to_string(),
            is_draft: false,
            tokens_used: None,
            model_used: None,
        })?;

        let (spend_total, vip_tier) = self
            .store
            .identity_snapshot(message.origin, &message.external_user_id)?
            .map(|mapping| (mapping.total_spend, mapping.vip_tier))
            .unwrap_or((0, VipTier::None));
        // Keep the conversation row's spend snapshot in step with the
        // identity cache so the console list/detail report real totals.
        if spend_total != conversation.spend_total {
            self.store
                .update_conversation_spend(conversation.id, spend_total)?;
        }

        let route = self.route(&conversation, spend_total, vip_tier)?;
        let route_changed = self.store.set_mode(
            conversation.id,
            route.mode,
            route.priority,
            route.operator_id,
        )?;
        if route_changed {
            tracing::info!(
                conversation_id = conversation.id,
                mode = route.mode.as_str(),
                priority = route.priority.as_str(),
                reason = route.reason.as_str(),
                "conversation rerouted"
            );
        }
        if route.downgraded {
            tracing::warn!(
                conversation_id = conversation.id,
                reason = route.reason.as_str(),
                "operator-required route downgraded to autonomous"
            );
        }

        let persona = PersonaConfig::from_performer(&performer);
        let outcome = match route.mode {
            ConversationMode::Autonomous => {
                let reply = self
                    .replies
                    .generate(&self.store, conversation.id, &message.text, &persona)
                    .await?;
                let record = self.store.append_message(NewMessage {
                    conversation_id: conversation.id,
                    sender: SenderRole::Agent,
                    text: reply.text.clone(),
                    channel: message.origin.as_str().to_string(),
                    is_draft: false,
                    tokens_used: Some(reply.tokens_used as i64),
                    model_used: Some(reply.model_used.clone()),
                })?;
                self.outbound.enqueue(OutboundJob {
                    origin: message.origin,
                    external_user_id: message.external_user_id.clone(),
                    text: reply.text.clone(),
                    conversation_id: conversation.id,
                    message_id: record.id,
                });
                InboundOutcome {
                    conversation_id: conversation.id,
                    mode: route.mode,
                    priority: route.priority,
                    reply: Some(reply.text),
                    queued_for_operator: false,
                    operator_downgraded: route.downgraded,
                }
            }
            ConversationMode::HybridDraft => {
                let reply = self
                    .replies
                    .generate(&self.store, conversation.id, &message.text, &persona)
                    .await?;
                // The draft waits for operator approval; nothing is enqueued
                // until the console finalizes it.
                self.store.append_message(NewMessage {
                    conversation_id: conversation.id,
                    sender: SenderRole::Agent,
                    text: reply.text,
                    channel: message.origin.as_str().to_string(),
                    is_draft: true,
                    tokens_used: Some(reply.tokens_used as i64),
                    model_used: Some(reply.model_used),
                })?;
                InboundOutcome {
                    conversation_id: conversation.id,
                    mode: route.mode,
                    priority: route.priority,
                    reply: None,
                    queued_for_operator: true,
                    operator_downgraded: false,
                }
            }
            ConversationMode::Human => InboundOutcome {
                conversation_id: conversation.id,
                mode: route.mode,
                priority: route.priority,
                reply: None,
                queued_for_operator: true,
                operator_downgraded: false,
            },
        };
        Ok(outcome)
    }

    fn lookup_performer(&self, performer_id: i64) -> Result<PerformerRecord, OrchestratorError> {
        match self.store.get_performer(performer_id)? {
            Some(performer) if performer.is_active => Ok(performer),
            // An inactive performer must not accept traffic; callers see the
            // same shape as an unknown id.
            _ => Err(OrchestratorError::PerformerNotFound(performer_id)),
        }
    }

    /// Fold the message's customer metadata into the cached identity stats.
    /// `meta.spend_total` is the platform's running total, while the cache
    /// accumulates deltas, so only the positive difference is applied.
    fn apply_cached_stats(&self, message: &InboundMessage) -> Result<(), OrchestratorError> {
        let Some(meta) = &message.meta else {
            return Ok(());
        };
        let cached_spend = self
            .store
            .identity_snapshot(message.origin, &message.external_user_id)?
            .map(|mapping| mapping.total_spend)
            .unwrap_or(0);
        let spend_delta = (meta.spend_total - cached_spend).max(0);
        self.store.update_cached_stats(
            message.origin,
            &message.external_user_id,
            spend_delta,
            meta.vip_tier.as_deref(),
            meta.display_name.as_deref(),
        )?;
        Ok(())
    }

    fn route(
        &self,
        conversation: &Conversation,
        spend_total: i64,
        vip_tier: VipTier,
    ) -> Result<lyra_routing::ResolvedRoute, OrchestratorError> {
        // Counter already includes the message appended above.
        let message_count = conversation.message_count + 1;

        let risk_score = self.risk_scorer.score(&RiskInput {
            spend_total,
            vip_tier,
            message_count,
        });
        let signals = RouteSignals {
            spend_total,
            vip_tier,
            risk_score,
            operator_online: self.store.any_operator_online()?,
            current_mode: conversation.mode,
            message_count,
            hour_of_day: (self.hour_source)(),
        };
        let decision = decide(&self.policy, &signals);

        let available_operator = self
            .store
            .first_online_operator()?
            .map(|operator| operator.id);
        Ok(resolve_operator(decision, &move || available_operator))
    }
}
