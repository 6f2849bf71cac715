//! # gptchat
//! Chat with GPT models from your terminal!
//!
//! An interactive command line client for the OpenAI chat completions API. Each line you type is
//! sent along with the whole conversation so far, the reply is printed (optionally rendered as
//! markdown), and token usage is tallied. When the chat ends the conversation is saved as JSON
//! under `session-history/` and the estimated cost is printed.
//!
//! ## Usage
//! These are the library crate documentation for `gptchat`. For usage of the binary see
//! ```shell
//! $ gptchat --help
//! ```
//!
//! ## Environment Variables:
//! - `OPENAI_API_KEY`: Required. The API key sent as a bearer token with every request.
//! - `RUST_LOG`: Optional. Diagnostic log filter (default: `warn`, `--verbose` sets `debug`).
//!
//! ## Config file
//! `config.yaml` in the working directory (or `--config <file>`), for example:
//! ```yaml
//! model: gpt-4
//! temperature: 0.7
//! markdown: true
//! multiline: false
//! max_tokens: 1024
//! ```
//! Also recognized: `api_base`, `timeout_secs`, `session_dir`, `history_file` and a `pricing` map
//! of `model: {prompt, completion}` rates per 1000 tokens.
//!
//! ## Notes:
//! - Type `/q` to end the chat. Ctrl-D and Ctrl-C at the prompt end it too; an empty line does nothing.
//! - A failed connection drops the message you just sent so you can retry it. An unauthorized
//!   or other HTTP error ends the chat (exit code 1) after the session has been saved.
//!
pub mod cli;
pub mod config;
pub mod errors;
pub mod openai;
pub mod pricing;
pub mod render;
pub mod session;
pub mod transcript;
pub mod usage;
