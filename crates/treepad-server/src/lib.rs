//! `treepad-server` - REST file server, AI chat proxy and configuration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// AI chat proxy for edit suggestions.
pub mod ai;
/// Server configuration (TOML, environment).
pub mod config;
/// HTTP routes and server loop.
pub mod web;

pub use ai::{AiClient, AiError, ChatMessage, ChatReply};
pub use config::{AiConfig, ConfigError, ServerConfig};
pub use web::{handle, start_web_server, ApiReply, ApiRequest, AppContext, WebServer};
