//! The conversation transcript and its on-disk session file.
//!
//! The chat completions API is stateless, so the whole transcript is sent on
//! every turn. Messages are only ever appended; the one exception is
//! [`Transcript::rollback`], which drops a user message whose request never
//! got an answer.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::errors::ChatError;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A `chat/completions` `messages` item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

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

/// Ordered, append-only conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Drop the trailing user message of a turn that failed before any reply
    /// was recorded. Returns the dropped message, or `None` (leaving the
    /// transcript untouched) if the last message is not from the user.
    pub fn rollback(&mut self) -> Option<Message> {
        match self.messages.last() {
            Some(last) if last.role == Role::User => self.messages.pop(),
            _ => None,
        }
    }

    /// Append one system message per context file, in the given order.
    pub fn load_context_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<(), ChatError> {
        for path in paths {
            let path = path.as_ref();
            let content = fs::read_to_string(path).map_err(|_| ChatError::ContextFile {
                path: path.display().to_string(),
            })?;
            tracing::debug!(path = %path.display(), bytes = content.len(), "loaded context file");
            self.push(Message::system(content));
        }
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Name of the session file for a chat started at `started`.
pub fn session_file_name(started: &DateTime<Local>) -> String {
    format!("chatgpt-session-{}.json", started.format("%Y%m%d-%H%M%S"))
}

/// Write the full transcript as indented JSON to `dir`, creating `dir` if
/// needed. Returns the path written. An existing file of the same name is
/// never overwritten; that case is an [`std::io::ErrorKind::AlreadyExists`] error.
pub fn save_session<P: AsRef<Path>>(
    dir: P,
    started: &DateTime<Local>,
    transcript: &Transcript,
) -> Result<PathBuf, ChatError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = dir.join(session_file_name(started));
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, transcript)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(path)
}

/// Read back a session file written by [`save_session`].
pub fn load_session<P: AsRef<Path>>(path: P) -> Result<Transcript, ChatError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;

    use chrono::TimeZone;

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2023, 7, 4, 9, 5, 3).unwrap()
    }

    #[test]
    fn rollback_only_drops_user_messages() {
        let mut transcript = Transcript::new();
        transcript.push(Message::system("be brief"));
        assert_eq!(transcript.rollback(), None);
        transcript.push(Message::user("hello"));
        assert_eq!(transcript.rollback(), Some(Message::user("hello")));
        assert_eq!(transcript.messages(), &[Message::system("be brief")]);
    }

    #[test]
    fn context_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.md");
        let b = dir.path().join("b.md");
        fs::write(&a, "context A").unwrap();
        fs::write(&b, "context B").unwrap();

        let mut transcript = Transcript::new();
        transcript.load_context_files(&[a, b]).unwrap();
        assert_eq!(
            transcript.messages(),
            &[Message::system("context A"), Message::system("context B")]
        );
    }

    #[test]
    fn missing_context_file() {
        let mut transcript = Transcript::new();
        let err = transcript
            .load_context_files(&["/nonexistent/context.md"])
            .unwrap_err();
        assert!(matches!(err, ChatError::ContextFile { .. }));
        assert!(transcript.is_empty());
    }

    #[test]
    fn wire_format() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn file_name_uses_start_time() {
        assert_eq!(
            session_file_name(&started()),
            "chatgpt-session-20230704-090503.json"
        );
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let session_dir = dir.path().join("session-history");
        let mut transcript = Transcript::new();
        transcript.push(Message::system("Always use code blocks."));
        transcript.push(Message::user("hello"));
        transcript.push(Message::assistant("hi\nthere"));

        let path = save_session(&session_dir, &started(), &transcript).unwrap();
        assert_eq!(
            path,
            session_dir.join("chatgpt-session-20230704-090503.json")
        );
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("[\n  {\n    \"role\": \"system\""));
        assert_eq!(load_session(&path).unwrap(), transcript);
    }

    #[test]
    fn same_second_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = Transcript::new();
        first.push(Message::user("first chat"));
        let path = save_session(dir.path(), &started(), &first).unwrap();

        let mut second = Transcript::new();
        second.push(Message::user("second chat"));
        match save_session(dir.path(), &started(), &second) {
            Err(ChatError::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::AlreadyExists),
            other => panic!("expected AlreadyExists, got {:?}", other),
        }
        assert_eq!(load_session(&path).unwrap(), first);
    }
}
