use clap::{Parser, Subcommand};

/// Chat with Zhipu GLM-4 from the terminal
#[derive(Debug, Parser)]
#[command(name = "glm-chat")]
#[command(version)]
#[command(about = "Chat with Zhipu GLM-4 from the terminal", long_about = None)]
pub struct Args {
    /// Model name (default: config/model or "glm-4")
    #[arg(short = 'm', long = "model", global = true)]
    pub model: Option<String>,

    /// Bot to talk to: "zhipu" or "echo" (default: config/provider or "zhipu")
    #[arg(long = "provider", global = true)]
    pub provider: Option<String>,

    /// Conversation to continue; each session keeps its own history
    #[arg(short = 's', long = "session", default_value = "default", global = true)]
    pub session: String,

    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// Prompt text (positional) (used when no subcommand is given)
    #[arg(value_name = "PROMPT")]
    pub prompt: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the provider is reachable and the API key is accepted
    Check,

    /// Interactive chat: one turn per input line, /reset clears, /quit exits
    Chat,

    /// Forget the session's conversation history
    Reset,
}
