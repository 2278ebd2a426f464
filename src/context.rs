use anyhow::{anyhow, Context as _};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Number of messages kept between turns.
pub const MAX_CONTEXT_MESSAGES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Conversation window carried from one turn to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContext {
    #[serde(default)]
    pub conversation: Vec<Message>,
}

impl ChatContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.conversation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversation.is_empty()
    }

    /// Outgoing message list for a new turn. Leaves `self` untouched.
    pub fn with_prompt(&self, prompt: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.conversation.len() + 1);
        messages.extend(self.conversation.iter().cloned());
        messages.push(Message::user(prompt));
        messages
    }

    /// Context after a finished turn: the outgoing list plus the reply,
    /// keeping only the most recent [`MAX_CONTEXT_MESSAGES`] entries.
    pub fn after_turn(mut outgoing: Vec<Message>, reply: &str) -> Self {
        outgoing.push(Message::assistant(reply));
        if outgoing.len() > MAX_CONTEXT_MESSAGES {
            outgoing.drain(..outgoing.len() - MAX_CONTEXT_MESSAGES);
        }
        Self {
            conversation: outgoing,
        }
    }
}

/// Persistence for one session's [`ChatContext`].
pub trait ContextStore: Send + Sync {
    fn load(&self) -> anyhow::Result<ChatContext>;
    fn save(&self, ctx: &ChatContext) -> anyhow::Result<()>;
}

/// In-process store; the context lives as long as the store does.
#[derive(Debug, Default)]
pub struct MemoryContextStore {
    inner: Mutex<ChatContext>,
}

impl MemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(ctx: ChatContext) -> Self {
        Self {
            inner: Mutex::new(ctx),
        }
    }
}

impl ContextStore for MemoryContextStore {
    fn load(&self) -> anyhow::Result<ChatContext> {
        let guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("context lock poisoned"))?;
        Ok(guard.clone())
    }

    fn save(&self, ctx: &ChatContext) -> anyhow::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| anyhow!("context lock poisoned"))?;
        *guard = ctx.clone();
        Ok(())
    }
}

/// JSON file store. A missing file loads as an empty context.
#[derive(Debug, Clone)]
pub struct FileContextStore {
    path: PathBuf,
}

impl FileContextStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Forget the stored conversation. Succeeds if there was none.
    pub fn clear(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow!(e))
                .with_context(|| format!("failed to remove context: {}", self.path.display())),
        }
    }
}

impl ContextStore for FileContextStore {
    fn load(&self) -> anyhow::Result<ChatContext> {
        let path = &self.path;
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ChatContext::new()),
            Err(e) => {
                return Err(anyhow!(e))
                    .with_context(|| format!("failed to read context: {}", path.display()))
            }
        };
        serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse context JSON: {}", path.display()))
    }

    fn save(&self, ctx: &ChatContext) -> anyhow::Result<()> {
        let path = &self.path;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create context directory: {}", dir.display()))?;

        let tmp = tmp_path(path);
        let bytes = serde_json::to_vec_pretty(ctx).context("failed to serialize context")?;
        std::fs::write(&tmp, bytes)
            .with_context(|| format!("failed to write temp context: {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("failed to move context into place: {}", path.display()))?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.to_path_buf();
    let file = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "context.json".to_string());
    p.set_file_name(format!("{file}.tmp"));
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("q{i}"))
                } else {
                    Message::assistant(format!("a{i}"))
                }
            })
            .collect()
    }

    #[test]
    fn with_prompt_appends_without_mutating() {
        let ctx = ChatContext {
            conversation: numbered(2),
        };
        let out = ctx.with_prompt("next");
        assert_eq!(out.len(), 3);
        assert_eq!(out[2], Message::user("next"));
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn after_turn_keeps_short_history_whole() {
        let ctx = ChatContext::after_turn(vec![Message::user("hello")], "Hi there");
        assert_eq!(
            ctx.conversation,
            vec![Message::user("hello"), Message::assistant("Hi there")]
        );
    }

    #[test]
    fn after_turn_drops_oldest_first() {
        let prior = ChatContext {
            conversation: numbered(10),
        };
        let ctx = ChatContext::after_turn(prior.with_prompt("q10"), "a11");
        assert_eq!(ctx.len(), MAX_CONTEXT_MESSAGES);
        assert_eq!(ctx.conversation[0].content, "q2");
        assert_eq!(ctx.conversation[8], Message::user("q10"));
        assert_eq!(ctx.conversation[9], Message::assistant("a11"));

        let contents: Vec<_> = ctx.conversation.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            ["q2", "a3", "q4", "a5", "q6", "a7", "q8", "a9", "q10", "a11"]
        );
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&Message::assistant("x")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"x"}"#);
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryContextStore::new();
        assert!(store.load().unwrap().is_empty());
        let ctx = ChatContext::after_turn(vec![Message::user("a")], "b");
        store.save(&ctx).unwrap();
        assert_eq!(store.load().unwrap(), ctx);
    }

    #[test]
    fn file_store_missing_file_is_empty_and_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileContextStore::new(dir.path().join("sessions").join("default.json"));
        assert!(store.load().unwrap().is_empty());
        store.clear().unwrap();

        let ctx = ChatContext::after_turn(vec![Message::user("hello")], "Hi");
        store.save(&ctx).unwrap();
        assert!(store.path().exists());
        assert_eq!(store.load().unwrap(), ctx);

        store.clear().unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn file_store_rejects_corrupt_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctx.json");
        std::fs::write(&path, b"{not json").unwrap();
        let err = FileContextStore::new(&path).load().unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse context JSON"));
    }
}
