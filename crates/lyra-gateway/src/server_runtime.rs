//! Gateway process bootstrap: storage, default roster seeding, and the
//! axum server loop.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use lyra_agent::ReplyGenerator;
use lyra_ai::{client_from_env, LlmClient};
use lyra_orchestrator::Orchestrator;
use lyra_routing::RoutePolicyConfig;
use lyra_outbound::OutboundQueue;
use lyra_store::{ConversationStore, NewPerformer};

use crate::http_api::{build_gateway_router, GatewayState, INBOUND_MESSAGE_ENDPOINT};

#[derive(Debug, Clone)]
/// Runtime configuration assembled from CLI flags and environment.
pub struct GatewayServerConfig {
    pub bind: String,
    pub db_path: PathBuf,
    pub default_performer_label: String,
    pub default_model: String,
    pub reply_history_limit: usize,
    /// Inclusive "start-end" local-hour window, e.g. "2-6".
    pub night_window: String,
}

pub(crate) fn parse_night_window(raw: &str) -> Result<(u8, u8)> {
    let (start, end) = raw
        .split_once('-')
        .with_context(|| format!("invalid --night-window '{raw}', expected start-end"))?;
    let start: u8 = start
        .trim()
        .parse()
        .with_context(|| format!("invalid night window start hour in '{raw}'"))?;
    let end: u8 = end
        .trim()
        .parse()
        .with_context(|| format!("invalid night window end hour in '{raw}'"))?;
    if start > 23 || end > 23 || start > end {
        anyhow::bail!("night window '{raw}' must satisfy 0 <= start <= end <= 23");
    }
    Ok((start, end))
}

pub fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

/// Seed one default performer on first boot so inbound traffic has a
/// routable persona before any roster management happens.
fn seed_default_performer(store: &ConversationStore, config: &GatewayServerConfig) -> Result<()> {
    if store.performer_count()? > 0 {
        return Ok(());
    }
    let performer = store.insert_performer(NewPerformer {
        label: config.default_performer_label.clone(),
        agent_id: format!(
            "agent-{}",
            config.default_performer_label.to_ascii_lowercase()
        ),
        provider: "openai".to_string(),
        model: config.default_model.clone(),
        system_prompt: None,
        temperature: 0.8,
        max_tokens: 256,
    })?;
    tracing::info!(
        performer_id = performer.id,
        label = performer.label.as_str(),
        "seeded default performer"
    );
    Ok(())
}

pub async fn run_gateway_server(config: GatewayServerConfig) -> Result<()> {
    if let Some(parent) = config.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let bind_addr = config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid --bind '{}'", config.bind))?;
    let night_window = parse_night_window(&config.night_window)?;

    let store = Arc::new(ConversationStore::open(&config.db_path)?);
    seed_default_performer(&store, &config)?;

    let client = client_from_env().map(|client| Arc::new(client) as Arc<dyn LlmClient>);
    if client.is_none() {
        tracing::warn!("no provider API key configured, serving mock replies");
    }
    let replies =
        ReplyGenerator::new(client).with_history_limit(config.reply_history_limit);
    let orchestrator = Orchestrator::new(store, Arc::new(OutboundQueue::new()), replies)
        .with_policy(RoutePolicyConfig {
            night_window,
            ..RoutePolicyConfig::default()
        });
    let state = Arc::new(GatewayState { orchestrator });

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind gateway server on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound gateway server address")?;
    println!(
        "lyra gateway listening: endpoint={} addr={} db={}",
        INBOUND_MESSAGE_ENDPOINT,
        local_addr,
        config.db_path.display()
    );

    let app = build_gateway_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("gateway server exited unexpectedly")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_night_window;

    #[test]
    fn unit_night_window_parses_and_rejects_malformed_input() {
        assert_eq!(parse_night_window("2-6").unwrap(), (2, 6));
        assert_eq!(parse_night_window("0-23").unwrap(), (0, 23));
        assert!(parse_night_window("6-2").is_err());
        assert!(parse_night_window("2").is_err());
        assert!(parse_night_window("2-26").is_err());
    }
}
