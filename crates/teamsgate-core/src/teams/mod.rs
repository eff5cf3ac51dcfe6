//! Teams integration: token cache, security service client and Graph client.
//!
//! This module provides:
//! - A single-flight cache for the service account bearer token
//! - The client that fetches that token from the security service
//! - A Graph API client for listing chats and sending messages

pub mod auth;
pub mod client;
pub mod models;
pub mod token;

pub use auth::SecurityServiceClient;
pub use client::GraphClient;
pub use models::{Chat, ChatLookup, ChatMember, ChatType, ContentType, OutboundMessage};
pub use token::{Token, TokenCache, TokenSource};
