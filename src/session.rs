//! The interactive chat: read a line, send the transcript, show the reply,
//! and on the way out save the conversation and print what it cost.

use std::env;
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use rustyline::error::ReadlineError;
use rustyline::{Cmd, DefaultEditor, KeyCode, KeyEvent, Modifiers};
use signal_hook::consts::SIGINT;

use crate::cli::{Args, API_KEY_VAR, MARKDOWN_INSTRUCTION, QUIT_SENTINEL};
use crate::config::Config;
use crate::errors::ChatError;
use crate::openai::{build_request, ApiClient};
use crate::render::{stdout_is_tty, Renderer};
use crate::transcript::{save_session, Message, Transcript};
use crate::usage::{ExpenseReport, UsageCounters};

/// One read from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),
    /// End of input (Ctrl-D) or an interrupt at the prompt (Ctrl-C).
    Quit,
}

/// Where user turns come from.
pub trait InputSource {
    fn read_input(&mut self, prompt: &str) -> Result<Input, ChatError>;
}

/// What a single line of input led to.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The quit sentinel was entered.
    Quit,
    /// Blank input; nothing was sent.
    Skipped,
    /// The assistant answered and the reply was recorded.
    Replied,
    /// The request failed without a reply; the user message was dropped so the
    /// turn can be retried.
    RolledBack(ChatError),
}

/// Where a finished chat was saved and what it cost.
#[derive(Debug)]
pub struct SessionSummary {
    pub session_file: PathBuf,
    pub report: ExpenseReport,
}

/// State of one chat, from the first prompt to the saved session file.
pub struct ChatSession {
    config: Config,
    client: ApiClient,
    renderer: Renderer,
    transcript: Transcript,
    usage: UsageCounters,
    started: DateTime<Local>,
    interrupted: Arc<AtomicBool>,
}

impl ChatSession {
    pub fn new(config: Config, client: ApiClient, renderer: Renderer) -> Self {
        Self {
            config,
            client,
            renderer,
            transcript: Transcript::new(),
            usage: UsageCounters::default(),
            started: Local::now(),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share `flag` as the session's interrupt flag. Once it is set the chat
    /// ends before the next prompt.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    /// Seed the transcript with system messages: the markdown instruction (if
    /// markdown is on), then each context file in order.
    pub fn seed<P: AsRef<Path>>(&mut self, context_files: &[P]) -> Result<(), ChatError> {
        if self.config.markdown {
            self.transcript.push(Message::system(MARKDOWN_INSTRUCTION));
        }
        self.transcript.load_context_files(context_files)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn usage(&self) -> &UsageCounters {
        &self.usage
    }

    /// Handle one line of user input.
    ///
    /// Fatal API errors (unauthorized, other HTTP statuses) are returned as
    /// `Err` after the pending user message has been rolled back.
    pub fn handle_input(&mut self, input: &str) -> Result<TurnOutcome, ChatError> {
        if input.eq_ignore_ascii_case(QUIT_SENTINEL) {
            return Ok(TurnOutcome::Quit);
        }
        if input.trim().is_empty() {
            return Ok(TurnOutcome::Skipped);
        }

        self.transcript.push(Message::user(input));
        let request = build_request(&self.config.model, &self.transcript, &self.config);
        let result = self.client.complete(&request);

        match result {
            Ok(completion) => {
                tracing::debug!(
                    prompt_tokens = completion.usage.prompt_tokens,
                    completion_tokens = completion.usage.completion_tokens,
                    "turn complete"
                );
                self.renderer.print_reply(&completion.message.content);
                self.transcript.push(completion.message);
                self.usage.record(&completion.usage);
                Ok(TurnOutcome::Replied)
            }
            Err(err) => {
                self.transcript.rollback();
                tracing::debug!(error = %err, "rolled back user message");
                if err.is_fatal() {
                    return Err(err);
                }
                self.renderer.print_error(&err.to_string());
                Ok(TurnOutcome::RolledBack(err))
            }
        }
    }

    /// Prompt for input until the user quits, the interrupt flag is set or a
    /// fatal error occurs. A request in flight when the flag is set still
    /// completes.
    pub fn run(&mut self, input: &mut dyn InputSource) -> Result<(), ChatError> {
        loop {
            if self.interrupted.load(Ordering::Relaxed) {
                tracing::info!("interrupted, ending chat");
                return Ok(());
            }
            let prompt = self.renderer.prompt(self.usage.total());
            let line = match input.read_input(&prompt)? {
                Input::Line(line) => line,
                Input::Quit => return Ok(()),
            };
            if let TurnOutcome::Quit = self.handle_input(&line)? {
                return Ok(());
            }
        }
    }

    /// Save the transcript and print the token total and expense. Both steps
    /// are attempted even if the other fails.
    pub fn finish(&self) -> Result<SessionSummary, ChatError> {
        let saved = save_session(&self.config.session_dir, &self.started, &self.transcript);
        match &saved {
            Ok(path) => tracing::info!(path = %path.display(), "session saved"),
            Err(err) => self
                .renderer
                .print_error(&format!("Failed to save session: {}", err)),
        }
        let report =
            ExpenseReport::compute(&self.usage, &self.config.model, &self.config.pricing_table());
        if let Ok(report) = &report {
            self.renderer.print_expense(report);
        }
        Ok(SessionSummary {
            session_file: saved?,
            report: report?,
        })
    }
}

/// Line editor with persistent history, reading one user turn at a time.
pub struct LineEditor {
    editor: DefaultEditor,
    history_file: PathBuf,
}

impl LineEditor {
    pub fn new(config: &Config) -> Result<Self, ChatError> {
        let mut editor = DefaultEditor::new()?;
        if config.multiline {
            editor.bind_sequence(KeyEvent(KeyCode::Enter, Modifiers::NONE), Cmd::Newline);
            editor.bind_sequence(KeyEvent(KeyCode::Enter, Modifiers::ALT), Cmd::AcceptLine);
        }
        if let Err(err) = editor.load_history(&config.history_file) {
            tracing::debug!(error = %err, "no input history loaded");
        }
        Ok(Self {
            editor,
            history_file: config.history_file.clone(),
        })
    }

    pub fn save_history(&mut self) {
        if let Err(err) = self.editor.save_history(&self.history_file) {
            tracing::warn!(error = %err, path = %self.history_file.display(), "failed to save input history");
        }
    }
}

impl InputSource for LineEditor {
    fn read_input(&mut self, prompt: &str) -> Result<Input, ChatError> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Input::Line(line))
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(Input::Quit),
            Err(err) => Err(err.into()),
        }
    }
}

/// Route SIGINT to `flag`. A second SIGINT while the flag is still set exits
/// immediately.
fn install_interrupt_handler(flag: &Arc<AtomicBool>) -> Result<(), ChatError> {
    signal_hook::flag::register_conditional_shutdown(SIGINT, 1, Arc::clone(flag))?;
    signal_hook::flag::register(SIGINT, Arc::clone(flag))?;
    Ok(())
}

/// Start an interactive chat. The session file and expense summary are
/// written however the chat ends.
pub fn run_chat(args: Args) -> Result<(), ChatError> {
    // sanity check chat is running from a tty
    let stdin_fileno = io::stdin().as_raw_fd();
    if !nix::unistd::isatty(stdin_fileno).unwrap_or(false) {
        return Err(ChatError::NotTty);
    }

    let config = Config::load(&args)?;
    let api_key = env::var(API_KEY_VAR)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or(ChatError::MissingApiKey)?;
    // an unpriced model would only surface at exit otherwise
    config.pricing_table().get(&config.model)?;

    let client = ApiClient::from_config(&config, api_key)?;
    let renderer = Renderer::new(config.markdown, stdout_is_tty());
    let mut editor = LineEditor::new(&config)?;
    let interrupted = Arc::new(AtomicBool::new(false));
    install_interrupt_handler(&interrupted)?;
    let mut session = ChatSession::new(config, client, renderer).with_interrupt_flag(interrupted);
    session.seed(&args.context)?;
    tracing::debug!(
        model = %session.config().model,
        system_messages = session.transcript().len(),
        "chat started"
    );

    println!("(model: {}, type '{}' to quit)", session.config().model, QUIT_SENTINEL);
    let outcome = session.run(&mut editor);
    editor.save_history();
    let finished = session.finish();
    outcome?;
    finished.map(|_| ())
}
