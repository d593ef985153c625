use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;

use lyra_agent::ReplyGenerator;
use lyra_ai::{ChatCompletion, ChatRequest, ChatUsage, LlmClient, LyraAiError};
use lyra_contract::{
    ConversationMode, ConversationPriority, InboundMessage, InboundMeta, Origin, SenderRole,
    CONVERSATION_CONTRACT_SCHEMA_VERSION,
};
use lyra_orchestrator::Orchestrator;
use lyra_outbound::OutboundQueue;
use lyra_store::{ConversationStore, NewPerformer};

struct ScriptedClient {
    completions: AsyncMutex<VecDeque<ChatCompletion>>,
    requests: AsyncMutex<Vec<ChatRequest>>,
}

impl ScriptedClient {
    fn new(texts: &[&str]) -> Self {
        let completions = texts
            .iter()
            .map(|text| ChatCompletion {
                text: text.to_string(),
                usage: ChatUsage {
                    prompt_tokens: 12,
                    completion_tokens: 8,
                    total_tokens: 20,
                },
                model: "grok-3-latest".to_string(),
            })
            .collect();
        Self {
            completions: AsyncMutex::new(completions),
            requests: AsyncMutex::new(Vec::new()),
        }
    }

    async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, LyraAiError> {
        self.requests.lock().await.push(request);
        let mut completions = self.completions.lock().await;
        completions.pop_front().ok_or_else(|| {
            LyraAiError::InvalidResponse("scripted completion queue exhausted".to_string())
        })
    }
}

struct FailingClient;

#[async_trait]
impl LlmClient for FailingClient {
    async fn complete(&self, _request: ChatRequest) -> Result<ChatCompletion, LyraAiError> {
        Err(LyraAiError::InvalidResponse(
            "provider unavailable".to_string(),
        ))
    }
}

fn build_orchestrator(
    client: Option<Arc<dyn LlmClient>>,
) -> (Orchestrator, Arc<ConversationStore>, Arc<OutboundQueue>) {
    let store = Arc::new(ConversationStore::open_in_memory().expect("open store"));
    store
        .insert_performer(NewPerformer {
            label: "Vela".to_string(),
            agent_id: "vela_v1".to_string(),
            provider: "openai_compat".to_string(),
            model: "grok-3-latest".to_string(),
            system_prompt: None,
            temperature: 0.8,
            max_tokens: 200,
        })
        .expect("seed performer");
    let outbound = Arc::new(OutboundQueue::new());
    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        Arc::clone(&outbound),
        ReplyGenerator::new(client),
    )
    .with_hour_source(|| 14);
    (orchestrator, store, outbound)
}

fn inbound(external_user_id: &str, text: &str, meta: Option<InboundMeta>) -> InboundMessage {
    InboundMessage {
        schema_version: CONVERSATION_CONTRACT_SCHEMA_VERSION,
        origin: Origin::Messenger,
        external_user_id: external_user_id.to_string(),
        performer_id: 1,
        text: text.to_string(),
        meta,
    }
}

#[tokio::test]
async fn autonomous_reply_flows_from_provider_to_confirmed_delivery() {
    let client = Arc::new(ScriptedClient::new(&["Hey you! How was your day?"]));
    let (orchestrator, store, outbound) =
        build_orchestrator(Some(Arc::clone(&client) as Arc<dyn LlmClient>));

    let outcome = orchestrator
        .handle_inbound(inbound("msgr-1", "hi Vela", None))
        .await
        .expect("inbound handled");

    assert_eq!(outcome.mode, ConversationMode::Autonomous);
    assert_eq!(outcome.reply.as_deref(), Some("Hey you! How was your day?"));
    assert_eq!(client.request_count().await, 1);

    let messages = store
        .conversation_messages(outcome.conversation_id)
        .expect("messages");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].sender, SenderRole::Agent);
    assert_eq!(messages[1].tokens_used, Some(20));
    assert_eq!(messages[1].model_used.as_deref(), Some("grok-3-latest"));

    let jobs = outbound.poll(Origin::Messenger, 10);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].text, "Hey you! How was your day?");
    assert!(outbound.confirm(Origin::Messenger, "msgr-1", jobs[0].message_id));
    assert_eq!(outbound.pending_count(), 0);
}

#[tokio::test]
async fn vip_draft_is_approved_with_edits_and_delivered_once() {
    let client = Arc::new(ScriptedClient::new(&["Draft: thinking of you!"]));
    let (orchestrator, store, outbound) =
        build_orchestrator(Some(Arc::clone(&client) as Arc<dyn LlmClient>));
    store.insert_operator("mira", 5).expect("operator");
    store.set_operator_online(1, true).expect("online");

    let meta = InboundMeta {
        spend_total: 120,
        vip_tier: Some("gold".to_string()),
        display_name: Some("Sam".to_string()),
    };
    let outcome = orchestrator
        .handle_inbound(inbound("msgr-2", "miss you", Some(meta)))
        .await
        .expect("inbound handled");

    assert_eq!(outcome.mode, ConversationMode::HybridDraft);
    assert_eq!(outcome.priority, ConversationPriority::Vip);
    assert_eq!(outcome.reply, None);
    assert!(outcome.queued_for_operator);
    assert_eq!(outbound.pending_count(), 0);

    let draft = store
        .conversation_messages(outcome.conversation_id)
        .expect("messages")
        .into_iter()
        .find(|message| message.is_draft)
        .expect("draft present");
    assert_eq!(draft.text, "Draft: thinking of you!");

    let receipt = orchestrator
        .submit_reply(
            outcome.conversation_id,
            "Missing you too, Sam!",
            SenderRole::Operator,
            Some(draft.id),
        )
        .expect("draft approved");
    assert_eq!(receipt.message_id, draft.id);

    let finalized = store
        .get_message(draft.id)
        .expect("read message")
        .expect("message exists");
    assert!(!finalized.is_draft);
    assert_eq!(
        finalized.original_text.as_deref(),
        Some("Draft: thinking of you!")
    );
    assert_eq!(finalized.text, "Missing you too, Sam!");

    let jobs = outbound.poll(Origin::Messenger, 10);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].text, "Missing you too, Sam!");
    assert_eq!(jobs[0].message_id, draft.id);
}

#[tokio::test]
async fn very_high_value_user_is_routed_to_a_human_with_no_agent_reply() {
    let client = Arc::new(ScriptedClient::new(&[]));
    let (orchestrator, store, outbound) =
        build_orchestrator(Some(Arc::clone(&client) as Arc<dyn LlmClient>));
    store.insert_operator("mira", 5).expect("operator");
    store.set_operator_online(1, true).expect("online");

    let meta = InboundMeta {
        spend_total: 2000,
        vip_tier: Some("platinum".to_string()),
        display_name: None,
    };
    let outcome = orchestrator
        .handle_inbound(inbound("msgr-3", "I need to talk", Some(meta)))
        .await
        .expect("inbound handled");

    assert_eq!(outcome.mode, ConversationMode::Human);
    assert_eq!(outcome.priority, ConversationPriority::Vip);
    assert_eq!(outcome.reply, None);
    assert!(outcome.queued_for_operator);
    // No model call and nothing queued; a person picks this one up.
    assert_eq!(client.request_count().await, 0);
    assert_eq!(outbound.pending_count(), 0);

    let conversation = store
        .get_conversation(outcome.conversation_id)
        .expect("read conversation")
        .expect("conversation exists");
    assert_eq!(conversation.operator_id, Some(1));
}

#[tokio::test]
async fn provider_failure_degrades_to_fallback_reply_not_an_error() {
    let (orchestrator, store, outbound) =
        build_orchestrator(Some(Arc::new(FailingClient) as Arc<dyn LlmClient>));

    let outcome = orchestrator
        .handle_inbound(inbound("msgr-4", "hello?", None))
        .await
        .expect("inbound handled despite provider failure");

    assert_eq!(outcome.mode, ConversationMode::Autonomous);
    let reply = outcome.reply.expect("fallback reply present");
    assert!(!reply.is_empty());

    let messages = store
        .conversation_messages(outcome.conversation_id)
        .expect("messages");
    assert_eq!(messages[1].tokens_used, Some(0));
    assert_eq!(messages[1].model_used.as_deref(), Some("error_fallback"));
    assert_eq!(outbound.pending_count(), 1);
}

#[tokio::test]
async fn repeated_messages_reuse_the_same_conversation_and_build_history() {
    let client = Arc::new(ScriptedClient::new(&["First reply.", "Second reply."]));
    let (orchestrator, store, _outbound) =
        build_orchestrator(Some(Arc::clone(&client) as Arc<dyn LlmClient>));

    let first = orchestrator
        .handle_inbound(inbound("msgr-5", "hello", None))
        .await
        .expect("first inbound");
    let second = orchestrator
        .handle_inbound(inbound("msgr-5", "are you there?", None))
        .await
        .expect("second inbound");

    assert_eq!(first.conversation_id, second.conversation_id);
    let messages = store
        .conversation_messages(first.conversation_id)
        .expect("messages");
    assert_eq!(messages.len(), 4);

    // The second provider request carries the earlier turns as context.
    let requests = client.requests.lock().await;
    let second_request = &requests[1];
    assert!(second_request.messages.len() >= 4);
}
