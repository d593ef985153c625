use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use lyra_gateway::{init_tracing, run_gateway_server, GatewayServerConfig};

#[derive(Debug, Parser)]
#[command(
    name = "lyra-gateway",
    about = "Conversation routing and orchestration gateway",
    version
)]
/// Public struct `Cli` used across Lyra components.
pub struct Cli {
    #[arg(
        long,
        env = "LYRA_GATEWAY_BIND",
        default_value = "127.0.0.1:8080",
        help = "Socket address the HTTP gateway listens on"
    )]
    pub bind: String,

    #[arg(
        long = "db-path",
        env = "LYRA_DB_PATH",
        default_value = ".lyra/conversations.sqlite3",
        help = "SQLite database path for conversation state"
    )]
    pub db_path: PathBuf,

    #[arg(
        long = "default-performer-label",
        env = "LYRA_DEFAULT_PERFORMER_LABEL",
        default_value = "Lyra",
        help = "Persona label seeded on first boot when the performer roster is empty"
    )]
    pub default_performer_label: String,

    #[arg(
        long = "default-model",
        env = "LYRA_PROVIDER_MODEL",
        default_value = "gpt-4o-mini",
        help = "Model used by the seeded default performer"
    )]
    pub default_model: String,

    #[arg(
        long = "night-window",
        env = "LYRA_NIGHT_WINDOW",
        default_value = "2-6",
        help = "Inclusive local-hour window (start-end) routed autonomously overnight"
    )]
    pub night_window: String,

    #[arg(
        long = "reply-history-limit",
        env = "LYRA_REPLY_HISTORY_LIMIT",
        default_value_t = 10,
        help = "Number of recent messages included as reply generation context"
    )]
    pub reply_history_limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_gateway_server(GatewayServerConfig {
        bind: cli.bind,
        db_path: cli.db_path,
        default_performer_label: cli.default_performer_label,
        default_model: cli.default_model,
        reply_history_limit: cli.reply_history_limit,
        night_window: cli.night_window,
    })
    .await
}
