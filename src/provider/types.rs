use super::TurnUpdate;
use crate::context::ChatContext;
use crate::error::ChatError;
use futures_core::stream::BoxStream;
use std::future::Future;
use std::pin::Pin;
use tokio_stream::StreamExt;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Ordered, finite updates of one turn: zero or more partial updates, then
/// a single `done` update, or an error instead.
pub type TurnStream = BoxStream<'static, Result<TurnUpdate, ChatError>>;

/// A chat backend the host can talk to.
pub trait ChatBot: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the backend is reachable and credentialed. Never fails;
    /// every problem is logged and reported as `false`.
    fn check_availability(&self) -> BoxFuture<'_, bool>;

    /// A fresh, empty conversation for a new session.
    fn create_context(&self) -> ChatContext {
        ChatContext::new()
    }

    /// Start a turn and return its updates.
    ///
    /// The stored context is committed before the final update is yielded.
    /// Dropping the stream before then abandons the turn without a commit.
    fn stream(&self, prompt: String) -> TurnStream;

    /// Run a turn to completion, reporting `(answer_so_far, done)` to `on_update`.
    fn send<'a>(
        &'a self,
        prompt: &'a str,
        on_update: &'a mut (dyn FnMut(&str, bool) + Send + 'a),
    ) -> BoxFuture<'a, Result<(), ChatError>> {
        let mut updates = self.stream(prompt.to_string());
        Box::pin(async move {
            while let Some(item) = updates.next().await {
                let update = item?;
                on_update(&update.text, update.done);
            }
            Ok(())
        })
    }
}
