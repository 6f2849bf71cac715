//! Utilities for querying the OpenAI API via the chat completions endpoint.
//!
//! For specific details on request/response schemas, see the [OpenAI API chat completions docs](https://platform.openai.com/docs/api-reference/chat/create).

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::errors::ChatError;
use crate::transcript::{Message, Transcript};

/// A `chat/completions` request body
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub temperature: f32,
    pub messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A `chat/completions` response choice
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: Message,
}

/// Token counts reported for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// A `chat/completions` response
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

/// The assistant's reply to one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub message: Message,
    pub usage: Usage,
}

/// Assemble the request body for the next turn. The whole transcript goes
/// out every time.
pub fn build_request<'a>(
    model: &'a str,
    transcript: &'a Transcript,
    config: &Config,
) -> ChatRequest<'a> {
    ChatRequest {
        model,
        temperature: config.temperature,
        messages: transcript.messages(),
        max_tokens: config.max_tokens,
    }
}

/// Blocking client for the `chat/completions` endpoint.
pub struct ApiClient {
    http: reqwest::blocking::Client,
    url: String,
    api_key: String,
}

impl ApiClient {
    pub fn new(
        api_base: &str,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ChatError> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ChatError::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            url: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &Config, api_key: impl Into<String>) -> Result<Self, ChatError> {
        Self::new(&config.api_base, api_key, config.timeout())
    }

    /// POST `request` and classify the outcome.
    ///
    /// Connection failures and timeouts come back as [`ChatError::Transport`];
    /// a 401 as [`ChatError::Unauthorized`]; any other non-200 status as
    /// [`ChatError::HttpStatus`].
    pub fn complete(&self, request: &ChatRequest<'_>) -> Result<Completion, ChatError> {
        tracing::debug!(
            url = %self.url,
            model = request.model,
            messages = request.messages.len(),
            "sending chat completion request"
        );
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .map_err(ChatError::Transport)?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "chat completion response");
        match status {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED => return Err(ChatError::Unauthorized),
            other => {
                return Err(ChatError::HttpStatus {
                    status: other.as_u16(),
                })
            }
        }

        let body: ChatResponse = response
            .json()
            .map_err(|e| ChatError::MalformedResponse(e.to_string()))?;
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::MalformedResponse("response has no choices".to_string()))?;
        Ok(Completion {
            message: choice.message,
            usage: body.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::TcpListener;

    use mockito::Matcher;
    use serde_json::json;

    const REPLY: &str = r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;

    fn transcript() -> Transcript {
        let mut transcript = Transcript::new();
        transcript.push(Message::system("ctx"));
        transcript.push(Message::user("hello"));
        transcript
    }

    #[test]
    fn request_carries_whole_transcript() {
        let transcript = transcript();
        let config = Config::default();
        let body = serde_json::to_value(build_request("gpt-4", &transcript, &config)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "gpt-4",
                "temperature": 1.0,
                "messages": [
                    {"role": "system", "content": "ctx"},
                    {"role": "user", "content": "hello"},
                ],
            })
        );
    }

    #[test]
    fn request_includes_max_tokens_when_set() {
        let transcript = transcript();
        let config = Config {
            max_tokens: Some(256),
            ..Config::default()
        };
        let body = serde_json::to_value(build_request("gpt-4", &transcript, &config)).unwrap();
        assert_eq!(body["max_tokens"], json!(256));
    }

    #[test]
    fn trailing_slash_in_base() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(REPLY)
            .create();
        let client = ApiClient::new(&format!("{}/", server.url()), "k", None).unwrap();
        let transcript = transcript();
        client
            .complete(&build_request("gpt-4", &transcript, &Config::default()))
            .unwrap();
        mock.assert();
    }

    #[test]
    fn success() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .match_body(Matcher::PartialJson(json!({"model": "gpt-4"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(REPLY)
            .create();

        let client = ApiClient::new(&server.url(), "test-key", None).unwrap();
        let transcript = transcript();
        let completion = client
            .complete(&build_request("gpt-4", &transcript, &Config::default()))
            .unwrap();
        assert_eq!(completion.message, Message::assistant("hi"));
        assert_eq!(
            completion.usage,
            Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15
            }
        );
        mock.assert();
    }

    #[test]
    fn unauthorized() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .create();
        let client = ApiClient::new(&server.url(), "bad", None).unwrap();
        let transcript = transcript();
        let err = client
            .complete(&build_request("gpt-4", &transcript, &Config::default()))
            .unwrap_err();
        assert!(matches!(err, ChatError::Unauthorized));
    }

    #[test]
    fn other_status() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .create();
        let client = ApiClient::new(&server.url(), "k", None).unwrap();
        let transcript = transcript();
        let err = client
            .complete(&build_request("gpt-4", &transcript, &Config::default()))
            .unwrap_err();
        assert!(matches!(err, ChatError::HttpStatus { status: 503 }));
    }

    #[test]
    fn empty_choices_is_malformed() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[],"usage":{"prompt_tokens":1,"completion_tokens":0,"total_tokens":1}}"#)
            .create();
        let client = ApiClient::new(&server.url(), "k", None).unwrap();
        let transcript = transcript();
        let err = client
            .complete(&build_request("gpt-4", &transcript, &Config::default()))
            .unwrap_err();
        assert!(matches!(err, ChatError::MalformedResponse(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn connection_refused_is_transport() {
        // Nothing listens on port 1.
        let client =
            ApiClient::new("http://127.0.0.1:1", "k", Some(Duration::from_secs(2))).unwrap();
        let transcript = transcript();
        let err = client
            .complete(&build_request("gpt-4", &transcript, &Config::default()))
            .unwrap_err();
        assert!(matches!(err, ChatError::Transport(_)));
        assert!(err.to_string().starts_with("Connection error, try again..."));
        assert!(!err.is_fatal());
    }

    #[test]
    fn silent_server_times_out() {
        // Accepts connections but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let client = ApiClient::new(&base, "k", Some(Duration::from_secs(1))).unwrap();
        let transcript = transcript();
        let err = client
            .complete(&build_request("gpt-4", &transcript, &Config::default()))
            .unwrap_err();
        match &err {
            ChatError::Transport(source) => assert!(source.is_timeout()),
            other => panic!("expected a transport timeout, got {:?}", other),
        }
        assert!(err.to_string().starts_with("Connection timed out, try again..."));
        assert!(!err.is_fatal());
        drop(listener);
    }
}
