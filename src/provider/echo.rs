use super::{commit_turn, spawn_turn, BoxFuture, ChatBot, TurnStream, TurnUpdate, UpdateSink};
use crate::context::ContextStore;
use crate::error::ChatError;
use std::sync::Arc;
use std::time::Duration;

/// Offline bot that streams the prompt back word by word.
///
/// Shares the turn and context handling of the real provider, so it is handy
/// for trying the CLI without an API key.
#[derive(Clone)]
pub struct EchoBot {
    store: Arc<dyn ContextStore>,
    delay: Duration,
}

impl EchoBot {
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self {
            store,
            delay: Duration::from_millis(60),
        }
    }

    /// Pause between streamed words.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn run_turn(self, prompt: String, sink: UpdateSink) -> Result<(), ChatError> {
        let context = self.store.load().map_err(ChatError::Context)?;
        let messages = context.with_prompt(&prompt);

        let reply = format!("You said: {prompt}");
        let mut text = String::new();
        for word in reply.split_inclusive(' ') {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            text.push_str(word);
            if !sink.send(TurnUpdate::partial(text.clone())).await {
                return Ok(());
            }
        }

        if sink.is_closed() {
            return Ok(());
        }
        commit_turn(self.store.as_ref(), messages, &text)?;
        sink.send(TurnUpdate::done(text)).await;
        Ok(())
    }
}

impl ChatBot for EchoBot {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn check_availability(&self) -> BoxFuture<'_, bool> {
        Box::pin(async { true })
    }

    fn stream(&self, prompt: String) -> TurnStream {
        let this = self.clone();
        spawn_turn(move |sink| this.run_turn(prompt, sink))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Message, MemoryContextStore};

    #[tokio::test]
    async fn echoes_and_commits() {
        let store = Arc::new(MemoryContextStore::new());
        let bot = EchoBot::new(store.clone()).with_delay(Duration::ZERO);
        assert!(bot.check_availability().await);

        let mut seen = Vec::new();
        let mut on_update = |text: &str, done: bool| seen.push((text.to_string(), done));
        bot.send("hi bot", &mut on_update).await.unwrap();

        assert_eq!(
            seen,
            vec![
                ("You ".to_string(), false),
                ("You said: ".to_string(), false),
                ("You said: hi ".to_string(), false),
                ("You said: hi bot".to_string(), false),
                ("You said: hi bot".to_string(), true),
            ]
        );
        assert_eq!(
            store.load().unwrap().conversation,
            vec![Message::user("hi bot"), Message::assistant("You said: hi bot")]
        );
    }
}
