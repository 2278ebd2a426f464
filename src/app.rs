use crate::cli;
use anyhow::Context;
use glm_chat::context::FileContextStore;
use glm_chat::provider::echo::EchoBot;
use glm_chat::{config, paths, ChatBot, ContextStore};
use std::io::Write;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio_stream::StreamExt;

/// Prints the growing answer as it arrives.
///
/// Updates carry the whole answer so far; only the unseen suffix is written.
#[derive(Debug, Default)]
struct Printer {
    printed: usize,
}

impl Printer {
    fn update(&mut self, text: &str, done: bool) {
        let mut out = std::io::stdout();
        if let Some(fresh) = text.get(self.printed..) {
            let _ = out.write_all(fresh.as_bytes());
            self.printed = text.len();
        }
        if done {
            let _ = writeln!(out);
            self.printed = 0;
        }
        out.flush().ok();
    }
}

pub fn context_store(session: &str) -> anyhow::Result<FileContextStore> {
    Ok(FileContextStore::new(paths::session_context_path(session)?))
}

pub fn build_bot(
    http: &reqwest::Client,
    cfg: Option<&config::Config>,
    args: &cli::Args,
    store: Arc<dyn ContextStore>,
) -> anyhow::Result<Box<dyn ChatBot>> {
    let provider_name = args
        .provider
        .clone()
        .or_else(|| cfg.and_then(|c| c.provider.clone()))
        .unwrap_or_else(|| "zhipu".to_string());

    match provider_name.as_str() {
        "zhipu" => {
            #[cfg(feature = "zhipu")]
            {
                use glm_chat::credentials::EnvCredentials;
                use glm_chat::provider::zhipu::{ZhipuBot, ZhipuSettings};

                let mut settings = ZhipuSettings::default();
                if let Some(base) = cfg.and_then(|c| c.base_url.as_deref()) {
                    settings = settings.with_base_url(base);
                }
                if let Some(model) = args.model.clone().or_else(|| cfg.and_then(|c| c.model.clone())) {
                    settings.model = model;
                }
                if let Some(max_tokens) = cfg.and_then(|c| c.max_tokens) {
                    settings.max_tokens = max_tokens;
                }
                if let Some(temperature) = cfg.and_then(|c| c.temperature) {
                    settings.temperature = temperature;
                }
                tracing::debug!(?settings, "using GLM-4 provider");

                let credentials = EnvCredentials::new(cfg.and_then(|c| c.api_key.clone()));
                let bot = ZhipuBot::new(http.clone(), Arc::new(credentials), store, settings);
                Ok(Box::new(bot))
            }
            #[cfg(not(feature = "zhipu"))]
            {
                let _ = (http, store);
                anyhow::bail!("zhipu provider is not enabled in this build")
            }
        }
        "echo" => Ok(Box::new(EchoBot::new(store))),
        other => anyhow::bail!("unknown provider: {other}"),
    }
}

pub async fn cmd_check(bot: &dyn ChatBot) -> anyhow::Result<()> {
    if bot.check_availability().await {
        println!("{}: available", bot.name());
        Ok(())
    } else {
        anyhow::bail!(
            "{}: unavailable (check {} or config.toml api_key; RUST_LOG=debug for details)",
            bot.name(),
            glm_chat::credentials::API_KEY_ENV
        )
    }
}

pub fn cmd_reset(store: &FileContextStore, session: &str) -> anyhow::Result<()> {
    store.clear()?;
    println!("Cleared session: {session}");
    Ok(())
}

/// One turn, printed as a stream.
pub async fn cmd_prompt(bot: &dyn ChatBot, prompt: String) -> anyhow::Result<()> {
    let mut updates = bot.stream(prompt);
    let mut printer = Printer::default();
    while let Some(item) = updates.next().await {
        let update = item.context("chat turn failed")?;
        printer.update(&update.text, update.done);
    }
    Ok(())
}

/// Line-by-line chat. Turns run one after another so each sees the
/// context committed by the previous one.
pub async fn cmd_chat(bot: &dyn ChatBot, store: &FileContextStore) -> anyhow::Result<()> {
    let history = store.load()?.len();
    eprintln!(
        "Chatting with {} ({} stored messages). Commands: /reset, /quit",
        bot.name(),
        history
    );

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        std::io::stderr().flush().ok();

        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                store.save(&bot.create_context())?;
                eprintln!("(history cleared)");
                continue;
            }
            _ => {}
        }

        let mut printer = Printer::default();
        let mut on_update = |text: &str, done: bool| printer.update(text, done);
        if let Err(e) = bot.send(line, &mut on_update).await {
            tracing::error!(error = %e, "chat turn failed");
            eprintln!("error: {e}");
        }
    }
    Ok(())
}
