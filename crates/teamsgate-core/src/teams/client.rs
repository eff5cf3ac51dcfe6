//! Microsoft Graph client for Teams chats.
//!
//! Every call takes its bearer token from the shared [`TokenCache`]. Listing
//! chats never retries. Sending a message retries exactly once when Graph
//! answers 401/403, after renewing the token, because a revoked token can
//! still look valid to the cache.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode, Url, header};
use serde::Deserialize;

use crate::config::{AppConfig, GraphConfig};
use crate::teams::auth::SecurityServiceClient;
use crate::teams::models::{Chat, ChatLookup, ChatMember, ChatType, OutboundMessage};
use crate::teams::token::{Token, TokenCache, TokenSource};
use crate::{CoreError, Result};

/// Upper bound on chat list pages followed in one call.
const MAX_CHAT_PAGES: usize = 500;

/// Graph API client.
#[derive(Debug)]
pub struct GraphClient<S = SecurityServiceClient> {
    http_client: Client,
    base_url: String,
    user_upn: Option<String>,
    tokens: TokenCache<S>,
}

/// One page of `GET /chats`.
#[derive(Debug, Deserialize)]
struct ChatPage {
    #[serde(default)]
    value: Vec<GraphChat>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphChat {
    id: String,
    chat_type: String,
    topic: Option<String>,
    web_url: Option<String>,
    #[serde(default)]
    members: Vec<GraphMember>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphMember {
    display_name: Option<String>,
    email: Option<String>,
}

impl GraphClient<SecurityServiceClient> {
    /// Build the client, its token cache and the security service client
    /// from the application config.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be created.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let source = SecurityServiceClient::new(&config.security)?;
        let tokens = TokenCache::new(
            source,
            Duration::from_secs(config.token.safety_margin_secs),
        );
        Self::new(&config.graph, tokens)
    }
}

impl<S: TokenSource> GraphClient<S> {
    /// Create a client that authenticates through `tokens`.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(config: &GraphConfig, tokens: TokenCache<S>) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| CoreError::Config(format!("creating HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_upn: config.user_upn.clone(),
            tokens,
        })
    }

    /// Fetch the first token ahead of the first request.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::AuthUnavailable` if the security service cannot
    /// provide a token.
    pub async fn warm_up(&self) -> Result<()> {
        self.tokens.get().await.map(|_| ())
    }

    /// List all chats of the service account, following pagination.
    ///
    /// Chats are returned in the order Graph returns them. An authorization
    /// failure is reported as a Graph error without renewing the token.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::AuthUnavailable` if no token can be obtained and
    /// `CoreError::Graph` for failed requests or malformed payloads.
    pub async fn list_chats(&self) -> Result<Vec<Chat>> {
        let token = self.tokens.get().await?;
        let mut url = self.chats_url();
        let mut visited = HashSet::new();
        let mut chats = Vec::new();

        loop {
            if !visited.insert(url.clone()) {
                return Err(CoreError::Graph(format!(
                    "chat list pagination revisits {url}"
                )));
            }
            if visited.len() > MAX_CHAT_PAGES {
                return Err(CoreError::Graph(format!(
                    "chat list exceeds {MAX_CHAT_PAGES} pages"
                )));
            }

            let response = self
                .http_client
                .get(&url)
                .bearer_auth(token.value())
                .header(header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(|e| CoreError::Graph(format!("list chats request failed: {e}")))?;

            if !response.status().is_success() {
                if response.status() == StatusCode::FORBIDDEN {
                    log::error!("access denied, ensure the service account has logged in");
                }
                return Err(graph_failure("list chats", response).await);
            }

            let page: ChatPage = response
                .json()
                .await
                .map_err(|e| CoreError::Graph(format!("parsing chat list: {e}")))?;

            for chat in page.value {
                chats.push(self.convert_chat(chat)?);
            }

            match page.next_link {
                Some(next) => {
                    self.check_next_link(&next)?;
                    url = next;
                }
                None => break,
            }
        }

        log::info!("retrieved {} chats", chats.len());
        Ok(chats)
    }

    /// Post a message into a chat.
    ///
    /// The message is validated before any upstream call is made. Each call
    /// creates a new message.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` for an empty chat ID or body,
    /// `CoreError::AuthUnavailable` if no token can be obtained, and
    /// `CoreError::Graph` if Graph rejects the message, including a second
    /// authorization failure after renewing the token.
    pub async fn send_message(&self, message: &OutboundMessage) -> Result<()> {
        message.validate()?;

        let url = format!(
            "{}/chats/{}/messages",
            self.base_url,
            urlencoding::encode(&message.chat_id)
        );
        let payload = serde_json::json!({
            "body": {
                "contentType": message.content_type.as_graph(),
                "content": message.body,
            }
        });

        let token = self.tokens.get().await?;
        let response = self.post_message(&url, &token, &payload).await?;

        if response.status().is_success() {
            log::info!("message sent to chat {}", message.chat_id);
            return Ok(());
        }
        if !is_auth_failure(response.status()) {
            return Err(graph_failure("send message", response).await);
        }

        log::warn!(
            "send message rejected with {}, retrying with a fresh token",
            response.status()
        );
        let token = self.tokens.renew(&token).await?;
        let response = self.post_message(&url, &token, &payload).await?;

        if response.status().is_success() {
            log::info!("message sent to chat {} after token renewal", message.chat_id);
            Ok(())
        } else {
            Err(graph_failure("send message", response).await)
        }
    }

    /// Find the chat for a user (by email or display name) or a group (by topic).
    ///
    /// One-on-one chats are preferred over group and meeting chats.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` for an empty `user_id`,
    /// `CoreError::ChatNotFound` if nothing matches, and the errors of
    /// [`Self::list_chats`].
    pub async fn find_chat(&self, user_id: &str) -> Result<ChatLookup> {
        let needle = user_id.trim();
        if needle.is_empty() {
            return Err(CoreError::Validation("user-id must not be empty".to_string()));
        }

        let chats = self.list_chats().await?;

        let direct = chats
            .iter()
            .filter(|chat| chat.chat_type == ChatType::OneOnOne)
            .find_map(|chat| {
                chat.members
                    .iter()
                    .find(|member| member.matches(needle))
                    .map(|member| ChatLookup {
                        chat_id: chat.id.clone(),
                        name: member
                            .display_name
                            .clone()
                            .unwrap_or_else(|| needle.to_string()),
                    })
            });

        direct
            .or_else(|| {
                chats
                    .iter()
                    .filter(|chat| chat.chat_type != ChatType::OneOnOne)
                    .find_map(|chat| {
                        chat.topic
                            .as_deref()
                            .filter(|topic| topic.eq_ignore_ascii_case(needle))
                            .map(|topic| ChatLookup {
                                chat_id: chat.id.clone(),
                                name: topic.to_string(),
                            })
                    })
            })
            .ok_or_else(|| CoreError::ChatNotFound(format!("no chat found for {needle}")))
    }

    fn chats_url(&self) -> String {
        match self.user_upn {
            Some(ref upn) => format!(
                "{}/users/{}/chats?$expand=members",
                self.base_url,
                urlencoding::encode(upn)
            ),
            None => format!("{}/me/chats?$expand=members", self.base_url),
        }
    }

    /// A next link must stay on the Graph origin, since it carries the token.
    fn check_next_link(&self, next: &str) -> Result<()> {
        let same_origin = match (Url::parse(&self.base_url), Url::parse(next)) {
            (Ok(base), Ok(link)) => base.origin() == link.origin(),
            _ => false,
        };

        if same_origin {
            Ok(())
        } else {
            Err(CoreError::Graph(format!(
                "chat list next link leaves {}: {next}",
                self.base_url
            )))
        }
    }

    fn convert_chat(&self, chat: GraphChat) -> Result<Chat> {
        let chat_type = ChatType::from_graph(&chat.chat_type).ok_or_else(|| {
            CoreError::Graph(format!(
                "unknown chat type '{}' for chat {}",
                chat.chat_type, chat.id
            ))
        })?;

        let members = chat
            .members
            .into_iter()
            .filter(|member| !self.is_service_account(member))
            .map(|member| ChatMember {
                display_name: member.display_name,
                email: member.email,
            })
            .collect();

        Ok(Chat {
            id: chat.id,
            chat_type,
            topic: chat.topic,
            members,
            web_url: chat.web_url,
        })
    }

    fn is_service_account(&self, member: &GraphMember) -> bool {
        match (self.user_upn.as_deref(), member.email.as_deref()) {
            (Some(upn), Some(email)) => upn.eq_ignore_ascii_case(email),
            _ => false,
        }
    }

    async fn post_message(
        &self,
        url: &str,
        token: &Token,
        payload: &serde_json::Value,
    ) -> Result<Response> {
        self.http_client
            .post(url)
            .bearer_auth(token.value())
            .json(payload)
            .send()
            .await
            .map_err(|e| CoreError::Graph(format!("send message request failed: {e}")))
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

async fn graph_failure(operation: &str, response: Response) -> CoreError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    log::error!("{operation} failed: {status} - {text}");
    CoreError::Graph(format!("{operation} failed: {status}"))
}
