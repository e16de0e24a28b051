//! Discord transport — REST API client implementing the notifier and
//! community-directory seams.
//!
//! Plain bot-API calls over reqwest: channel messages with button
//! components for the review notification, guild member search for
//! applicant resolution, DM channels for applicant messages, and the role
//! endpoint for grants. Event delivery (button presses) arrives separately
//! through the HTTP control surface.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::decision::{DirectMessage, Directory, Member};
use crate::error::TransportError;
use crate::publish::{Notification, Notifier};

const API_BASE: &str = "https://discord.com/api/v10";

/// Notification embed accent color, `#ff0ad6`.
const EMBED_COLOR: u32 = 0xff0ad6;

/// Green "success" button style.
const BUTTON_SUCCESS: u8 = 3;
/// Red "danger" button style.
const BUTTON_DANGER: u8 = 4;

pub struct DiscordClient {
    http: reqwest::Client,
    bot_token: SecretString,
    /// Review channel that receives application notifications.
    channel_id: String,
    /// Community the applicants are resolved in.
    guild_id: String,
    /// User mentioned before each notification.
    staff_ping_user_id: String,
}

#[derive(Debug, Deserialize)]
struct GuildMember {
    user: DiscordUser,
    nick: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct DmChannel {
    id: String,
}

impl DiscordClient {
    pub fn new(
        bot_token: SecretString,
        channel_id: String,
        guild_id: String,
        staff_ping_user_id: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
            channel_id,
            guild_id,
            staff_ping_user_id,
        }
    }

    fn api_url(path: &str) -> String {
        format!("{API_BASE}{path}")
    }

    async fn post_message(
        &self,
        channel_id: &str,
        body: serde_json::Value,
    ) -> Result<(), TransportError> {
        let response = self
            .http
            .post(Self::api_url(&format!("/channels/{channel_id}/messages")))
            .header("Authorization", format!("Bot {}", self.bot_token.expose_secret()))
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed {
                channel: channel_id.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let err = response.text().await.unwrap_or_default();
            return Err(TransportError::SendFailed {
                channel: channel_id.to_string(),
                reason: format!("message create failed ({status}): {err}"),
            });
        }
        Ok(())
    }

    /// Open (or reuse) the DM channel with a user.
    async fn dm_channel(&self, user_id: &str) -> Result<String, TransportError> {
        let response = self
            .http
            .post(Self::api_url("/users/@me/channels"))
            .header("Authorization", format!("Bot {}", self.bot_token.expose_secret()))
            .json(&json!({ "recipient_id": user_id }))
            .send()
            .await
            .map_err(|e| TransportError::DirectFailed {
                handle: user_id.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let err = response.text().await.unwrap_or_default();
            return Err(TransportError::DirectFailed {
                handle: user_id.to_string(),
                reason: format!("DM channel open failed ({status}): {err}"),
            });
        }

        let channel: DmChannel = response.json().await.map_err(|e| TransportError::DirectFailed {
            handle: user_id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(channel.id)
    }
}

/// Username part of a `name#discriminator` handle, trimmed. Handles
/// without a discriminator pass through unchanged.
fn search_name(handle: &str) -> &str {
    handle.split('#').next().unwrap_or(handle).trim()
}

/// Notification message body: one embed plus the accept/reject button row.
fn notification_body(notification: &Notification) -> serde_json::Value {
    let fields: Vec<serde_json::Value> = notification
        .fields
        .iter()
        .map(|(name, value)| json!({ "name": format!("**{name}**"), "value": value }))
        .collect();

    json!({
        "embeds": [{
            "title": notification.title,
            "color": EMBED_COLOR,
            "description": "A new application has been submitted.",
            "fields": fields,
        }],
        "components": [{
            "type": 1,
            "components": [
                {
                    "type": 2,
                    "style": BUTTON_SUCCESS,
                    "label": "Accept",
                    "custom_id": notification.accept_tag,
                },
                {
                    "type": 2,
                    "style": BUTTON_DANGER,
                    "label": "Reject",
                    "custom_id": notification.reject_tag,
                },
            ],
        }],
    })
}

#[async_trait]
impl Notifier for DiscordClient {
    async fn publish(&self, notification: &Notification) -> Result<(), TransportError> {
        // Attention ping first, then the actionable notification.
        self.post_message(
            &self.channel_id,
            json!({ "content": format!("<@{}>", self.staff_ping_user_id) }),
        )
        .await?;

        self.post_message(&self.channel_id, notification_body(notification))
            .await
    }
}

#[async_trait]
impl Directory for DiscordClient {
    async fn find_member_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<Member>, TransportError> {
        let name = search_name(handle);
        if name.is_empty() {
            return Ok(None);
        }

        let response = self
            .http
            .get(Self::api_url(&format!(
                "/guilds/{}/members/search",
                self.guild_id
            )))
            .query(&[("query", name), ("limit", "10")])
            .header("Authorization", format!("Bot {}", self.bot_token.expose_secret()))
            .send()
            .await
            .map_err(|e| TransportError::LookupFailed {
                handle: handle.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let err = response.text().await.unwrap_or_default();
            return Err(TransportError::LookupFailed {
                handle: handle.to_string(),
                reason: format!("member search failed ({status}): {err}"),
            });
        }

        let members: Vec<GuildMember> =
            response.json().await.map_err(|e| TransportError::LookupFailed {
                handle: handle.to_string(),
                reason: e.to_string(),
            })?;

        Ok(members
            .into_iter()
            .find(|m| m.user.username.eq_ignore_ascii_case(name))
            .map(|m| Member {
                display_name: m.nick.unwrap_or_else(|| m.user.username.clone()),
                id: m.user.id,
            }))
    }

    async fn send_direct(
        &self,
        member: &Member,
        message: &DirectMessage,
    ) -> Result<(), TransportError> {
        let channel_id = self.dm_channel(&member.id).await?;
        self.post_message(
            &channel_id,
            json!({
                "embeds": [{
                    "title": message.title,
                    "description": message.body,
                    "footer": { "text": "Application Bot" },
                }],
            }),
        )
        .await
        .map_err(|e| TransportError::DirectFailed {
            handle: member.display_name.clone(),
            reason: e.to_string(),
        })
    }

    async fn grant_role(&self, member: &Member, role_id: &str) -> Result<(), TransportError> {
        let response = self
            .http
            .put(Self::api_url(&format!(
                "/guilds/{}/members/{}/roles/{}",
                self.guild_id, member.id, role_id
            )))
            .header("Authorization", format!("Bot {}", self.bot_token.expose_secret()))
            .send()
            .await
            .map_err(|e| TransportError::RoleGrantFailed {
                handle: member.display_name.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let err = response.text().await.unwrap_or_default();
            return Err(TransportError::RoleGrantFailed {
                handle: member.display_name.clone(),
                reason: format!("role add failed ({status}): {err}"),
            });
        }
        Ok(())
    }
}
