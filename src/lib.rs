//! Streaming chat adapter for the Zhipu GLM-4 chat-completions API.
//!
//! The crate exposes a [`provider::ChatBot`] interface with two
//! implementations: the real GLM-4 client and an offline echo bot. Each turn
//! sends the stored conversation plus a new prompt, streams the answer back
//! incrementally and commits a trimmed conversation window once the answer is
//! complete.

pub mod config;
pub mod context;
pub mod credentials;
pub mod error;
pub mod paths;
pub mod provider;

pub use context::{ChatContext, ContextStore, FileContextStore, MemoryContextStore, Message, Role};
pub use credentials::{CredentialSource, EnvCredentials, StaticCredentials};
pub use error::ChatError;
pub use provider::{ChatBot, TurnUpdate};
