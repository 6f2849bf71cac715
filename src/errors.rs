use thiserror::Error;

/// gptchat errors
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("OPENAI_API_KEY is not set. Export it before starting a chat.")]
    MissingApiKey,
    #[error("No pricing entry for model: {model}. Add one under `pricing` in the config file.")]
    UnknownModel { model: String },
    #[error("Failed to read context file: {path}. Does it exist?")]
    ContextFile { path: String },
    #[error("{hint} ({0})", hint = transport_hint(.0))]
    Transport(#[source] reqwest::Error),
    #[error("Unauthorized. Check your API key.")]
    Unauthorized,
    #[error("Error: {status}")]
    HttpStatus { status: u16 },
    #[error("Unexpected response from the API: {0}")]
    MalformedResponse(String),
    #[error("Input error: {0}")]
    Input(#[from] rustyline::error::ReadlineError),
    #[error("Chat should have stdin connected to a tty, otherwise input is not interactive.")]
    NotTty,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

fn transport_hint(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        "Connection timed out, try again..."
    } else {
        "Connection error, try again..."
    }
}

impl ChatError {
    /// Whether this error ends the session rather than just the current turn.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ChatError::Transport(_) | ChatError::MalformedResponse(_)
        )
    }
}
