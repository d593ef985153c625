//! Operator console operations: browsing conversations, approving or
//! rewriting drafts, sending manual replies, and forcing mode changes.

use serde::Serialize;

use lyra_contract::{ConversationMode, SenderRole};
use lyra_outbound::OutboundJob;
use lyra_store::{
    Conversation, ConversationFilters, ConversationSummary, DraftFinalizeOutcome, MessageRecord,
    NewMessage,
};

use crate::inbound_pipeline::Orchestrator;
use crate::OrchestratorError;

/// Channel stamped on messages authored from the console.
pub const OPERATOR_CONSOLE_CHANNEL: &str = "operator_console";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// Full view of one conversation for the console detail pane.
pub struct ConversationDetail {
    pub conversation: Conversation,
    pub performer_label: Option<String>,
    pub messages: Vec<MessageRecord>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// Receipt for a console-submitted reply. `enqueued` is always true today;
/// it exists so a future moderation hold can be reported without a schema
/// change.
pub struct ReplyReceipt {
    pub conversation_id: i64,
    pub message_id: i64,
    pub enqueued: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// Result of a manual mode override.
pub struct ModeChange {
    pub conversation_id: i64,
    pub previous_mode: ConversationMode,
    pub mode: ConversationMode,
    pub changed: bool,
}

impl Orchestrator {
    pub fn list_conversations(
        &self,
        filters: &ConversationFilters,
    ) -> Result<Vec<ConversationSummary>, OrchestratorError> {
        Ok(self.store().list_conversations(filters)?)
    }

    pub fn conversation_detail(
        &self,
        conversation_id: i64,
    ) -> Result<ConversationDetail, OrchestratorError> {
        let conversation = self
            .store()
            .get_conversation(conversation_id)?
            .ok_or(OrchestratorError::ConversationNotFound(conversation_id))?;
        let performer_label = self
            .store()
            .get_performer(conversation.performer_id)?
            .map(|performer| performer.label);
        let messages = self.store().conversation_messages(conversation_id)?;
        Ok(ConversationDetail {
            conversation,
            performer_label,
            messages,
        })
    }

    /// Send an operator-authored reply, either by finalizing an existing
    /// draft (`edit_draft_id`) or by appending a fresh message. Both paths
    /// end with exactly one outbound job.
    pub fn submit_reply(
        &self,
        conversation_id: i64,
        text: &str,
        send_as: SenderRole,
        edit_draft_id: Option<i64>,
    ) -> Result<ReplyReceipt, OrchestratorError> {
        if text.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "reply text must be non-empty".to_string(),
            ));
        }
        if send_as == SenderRole::User {
            return Err(OrchestratorError::InvalidInput(
                "console replies cannot be sent as the user".to_string(),
            ));
        }
        let conversation = self
            .store()
            .get_conversation(conversation_id)?
            .ok_or(OrchestratorError::ConversationNotFound(conversation_id))?;

        let message = match edit_draft_id {
            Some(draft_id) => self.finalize_console_draft(&conversation, draft_id, text, send_as)?,
            None => self.store().append_message(NewMessage {
                conversation_id,
                sender: send_as,
                text: text.to_string(),
                channel: OPERATOR_CONSOLE_CHANNEL.to_string(),
                is_draft: false,
                tokens_used: None,
                model_used: None,
            })?,
        };

        self.outbound().enqueue(OutboundJob {
            origin: conversation.origin,
            external_user_id: conversation.external_user_id.clone(),
            text: message.text.clone(),
            conversation_id,
            message_id: message.id,
        });
        tracing::info!(
            conversation_id,
            message_id = message.id,
            sender = send_as.as_str(),
            edited_draft = edit_draft_id.is_some(),
            "console reply enqueued"
        );
        Ok(ReplyReceipt {
            conversation_id,
            message_id: message.id,
            enqueued: true,
        })
    }

    fn finalize_console_draft(
        &self,
        conversation: &Conversation,
        draft_id: i64,
        text: &str,
        send_as: SenderRole,
    ) -> Result<MessageRecord, OrchestratorError> {
        let draft = self
            .store()
            .get_message(draft_id)?
            .ok_or(OrchestratorError::DraftNotFound(draft_id))?;
        if draft.conversation_id != conversation.id {
            return Err(OrchestratorError::InvalidInput(format!(
                "draft {} belongs to a different conversation",
                draft_id
            )));
        }
        match self.store().finalize_draft(draft_id, text, send_as)? {
            DraftFinalizeOutcome::Finalized(record) => Ok(record),
            DraftFinalizeOutcome::NotFound => Err(OrchestratorError::DraftNotFound(draft_id)),
            DraftFinalizeOutcome::NotADraft => Err(OrchestratorError::MessageNotADraft(draft_id)),
        }
    }

    /// Manually override a conversation's mode from the console. Switching
    /// to a mode that needs an operator assigns the first online one;
    /// switching to autonomous releases the assignment.
    pub fn set_conversation_mode(
        &self,
        conversation_id: i64,
        mode: ConversationMode,
    ) -> Result<ModeChange, OrchestratorError> {
        let conversation = self
            .store()
            .get_conversation(conversation_id)?
            .ok_or(OrchestratorError::ConversationNotFound(conversation_id))?;

        let operator_id = if mode.requires_operator() {
            self.store()
                .first_online_operator()?
                .map(|operator| operator.id)
                .or(conversation.operator_id)
        } else {
            None
        };
        let changed =
            self.store()
                .set_mode(conversation_id, mode, conversation.priority, operator_id)?;
        if changed {
            tracing::info!(
                conversation_id,
                previous_mode = conversation.mode.as_str(),
                mode = mode.as_str(),
                "conversation mode overridden from console"
            );
        }
        Ok(ModeChange {
            conversation_id,
            previous_mode: conversation.mode,
            mode,
            changed,
        })
    }
}
