//! Core library for teamsgate - a Microsoft Teams bridge for internal services.
//!
//! This crate provides:
//! - Configuration loading and management
//! - XDG-compliant config path resolution
//! - Schema and example config generation
//! - A single-flight bearer token cache backed by the security service
//! - A Microsoft Graph client for listing chats and sending messages
//! - Common types and error handling

pub mod config;
pub mod error;
pub mod paths;
pub mod schema;
pub mod teams;

pub use config::{
    AppConfig, GraphConfig, LogLevel, LoggingConfig, SecurityConfig, ServerConfig, TokenConfig,
};
pub use error::{CoreError, Result};
pub use paths::{AppPaths, default_config_dir};
pub use schema::{generate_example_config, generate_schema};
pub use teams::{
    Chat, ChatLookup, ChatMember, ChatType, ContentType, GraphClient, OutboundMessage,
    SecurityServiceClient, Token, TokenCache, TokenSource,
};

/// Application name used for config directories and environment prefix.
pub const APP_NAME: &str = "teamsgate";

/// Returns the environment variable prefix for this application.
#[must_use]
pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
