use std::path::PathBuf;

use clap::Parser;

/// The default model to chat with when the config file names none.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
/// The default base of the chat completions endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
/// Environment variable holding the API bearer token.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Directory the finished conversation is written to.
pub const DEFAULT_SESSION_DIR: &str = "session-history";
/// File the line editor keeps its input history in.
pub const DEFAULT_HISTORY_FILE: &str = ".history";
/// Typing exactly this (in any case, no surrounding whitespace) ends the chat.
pub const QUIT_SENTINEL: &str = "/q";
/// Prepended as a system message when markdown rendering is on, so replies
/// come back in a shape the renderer can format.
pub const MARKDOWN_INSTRUCTION: &str = "Always use code blocks with the appropriate language tags. If asked for a table, always format it using Markdown syntax.";

/// CLI for `gptchat`
#[derive(Debug, Default, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Path to a context file. Its content is sent as a system message
    /// before the chat starts. Can be repeated.
    #[arg(short, long = "context", value_name = "FILE")]
    pub context: Vec<PathBuf>,
    /// Model to chat with, overriding the config file.
    #[arg(short, long)]
    pub model: Option<String>,
    /// Use the multiline input mode (Enter inserts a newline, Alt+Enter sends).
    #[arg(long, visible_alias = "ml")]
    pub multiline: bool,
    /// Config file to read instead of `./config.yaml`.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Log diagnostics at debug level to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}
