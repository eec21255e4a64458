use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use aiterm::cli::{self, Cli};
use aiterm::config::AppConfig;
use aiterm::prompts::Prompts;
use aiterm::{ChatSession, Dispatcher};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with streamed output.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Cli::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => {
            // Auto-generate config file on first run
            let path = AppConfig::config_path()?;
            if !path.exists() {
                AppConfig::save_default_to(&path)?;
                eprintln!("[Config] Created default config: {}", path.display());
            }
            path
        }
    };
    let mut config = AppConfig::load_from(&config_path)?;
    config.apply_overrides(|name| std::env::var(name).ok())?;
    args.apply(&mut config);

    tracing::info!(
        provider = %config.ai.provider,
        model = config.ai.active_model(),
        "Starting aiterm"
    );

    let mut session = ChatSession::new(Dispatcher::new(Prompts::default()), config.ai);

    if args.command.is_empty() {
        cli::run_repl(session).await
    } else {
        cli::run_once(&mut session, &args.command.join(" ")).await
    }
}
