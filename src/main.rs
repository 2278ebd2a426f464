mod app;
mod cli;

use anyhow::Context;
use clap::Parser;
use glm_chat::{config, paths};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    let config_dir = paths::config_dir()?;
    let cfg = config::Config::load_optional(config_dir.join("config.toml"))?;
    tracing::debug!(?config_dir, "resolved config");

    let store = app::context_store(&args.session)?;
    tracing::debug!(session = %args.session, path = %store.path().display(), "resolved session");

    if let Some(cli::Command::Reset) = args.cmd {
        return app::cmd_reset(&store, &args.session);
    }

    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let bot = app::build_bot(&http, cfg.as_ref(), &args, Arc::new(store.clone()))?;

    match args.cmd {
        Some(cli::Command::Check) => return app::cmd_check(bot.as_ref()).await,
        Some(cli::Command::Chat) => return app::cmd_chat(bot.as_ref(), &store).await,
        Some(cli::Command::Reset) | None => {}
    }

    let prompt = args.prompt.join(" ");
    if prompt.trim().is_empty() {
        anyhow::bail!("No prompt provided. Try: glm-chat \"Hello\" or `glm-chat chat`");
    }

    app::cmd_prompt(bot.as_ref(), prompt).await
}
