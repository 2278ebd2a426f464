pub mod echo;
pub mod sse;
pub mod turn;
mod types;
#[cfg(feature = "zhipu")]
pub mod zhipu;

pub use turn::{Turn, TurnUpdate};
pub use types::{BoxFuture, ChatBot, TurnStream};

use crate::context::{ChatContext, ContextStore, Message};
use crate::error::ChatError;
use std::future::Future;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Sending half of a [`TurnStream`].
pub(crate) struct UpdateSink {
    tx: mpsc::Sender<Result<TurnUpdate, ChatError>>,
}

impl UpdateSink {
    /// Forward an update. Returns `false` once the consumer has gone away.
    pub(crate) async fn send(&self, update: TurnUpdate) -> bool {
        self.tx.send(Ok(update)).await.is_ok()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Run a turn on its own task and expose its updates as a stream.
///
/// An error returned by `run` becomes the stream's last item.
pub(crate) fn spawn_turn<F, Fut>(run: F) -> TurnStream
where
    F: FnOnce(UpdateSink) -> Fut,
    Fut: Future<Output = Result<(), ChatError>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Result<TurnUpdate, ChatError>>(64);
    let fut = run(UpdateSink { tx: tx.clone() });

    tokio::spawn(async move {
        if let Err(e) = fut.await {
            let _ = tx.send(Err(e)).await;
        }
    });

    Box::pin(ReceiverStream::new(rx))
}

/// Write the finished turn back as the session's new context.
pub(crate) fn commit_turn(
    store: &dyn ContextStore,
    outgoing: Vec<Message>,
    reply: &str,
) -> Result<(), ChatError> {
    let ctx = ChatContext::after_turn(outgoing, reply);
    store.save(&ctx).map_err(ChatError::Context)?;
    tracing::debug!(messages = ctx.len(), "committed conversation context");
    Ok(())
}
