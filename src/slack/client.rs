//! Slack Web API client.
//!
//! Everything the bot needs from Slack sits behind [`SlackApi`] so tests can
//! substitute a mock: membership lookups, message posting, the scheduling
//! user's timezone, and posting to a command's `response_url`.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::slack::{classify, IdKind, UnknownIdentifier};

const API_BASE: &str = "https://slack.com/api";

/// Operations the bot performs against Slack.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// List the members of a channel (`C…`) or user group (`S…`).
    async fn members_of(&self, target: &str) -> Result<Vec<String>>;

    /// Post a message to a channel.
    async fn post_message(&self, channel: &str, text: &str) -> Result<()>;

    /// IANA timezone name of a user.
    async fn user_timezone(&self, user_id: &str) -> Result<String>;

    /// POST a JSON payload to a command's temporary response URL.
    async fn respond(&self, response_url: &str, payload: &Value) -> Result<()>;
}

/// Client for the real Slack Web API.
pub struct SlackClient {
    http: Client,
    token: String,
    api_base: String,
}

impl SlackClient {
    pub fn new(token: &str) -> Self {
        Self {
            http: Client::new(),
            token: token.to_string(),
            api_base: API_BASE.to_string(),
        }
    }

    /// Call a Web API method and return the checked response body.
    async fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{}", self.api_base, method);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await
            .with_context(|| format!("request to {} failed", method))?;

        let body: Value = response
            .json()
            .await
            .with_context(|| format!("invalid JSON from {}", method))?;
        if !body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
            let error = body
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            bail!("Slack API {} returned {}", method, error);
        }
        debug!("Slack API {} ok", method);
        Ok(body)
    }
}

#[async_trait]
impl SlackApi for SlackClient {
    async fn members_of(&self, target: &str) -> Result<Vec<String>> {
        let (method, param, key) = match classify(target)? {
            IdKind::Channel => ("conversations.members", "channel", "members"),
            IdKind::Group => ("usergroups.users.list", "usergroup", "users"),
            IdKind::User => return Err(UnknownIdentifier(target.to_string()).into()),
        };
        let body = self.call(method, &[(param, target)]).await?;
        body.get(key)
            .and_then(|v| v.as_array())
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .ok_or_else(|| anyhow!("Slack API {} returned no {}", method, key))
    }

    async fn post_message(&self, channel: &str, text: &str) -> Result<()> {
        let url = format!("{}/chat.postMessage", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "channel": channel, "text": text }))
            .send()
            .await
            .context("chat.postMessage request failed")?;
        let body: Value = response.json().await.context("invalid JSON from chat.postMessage")?;
        if !body.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
            let error = body
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            bail!("chat.postMessage returned {}", error);
        }
        Ok(())
    }

    async fn user_timezone(&self, user_id: &str) -> Result<String> {
        let body = self.call("users.info", &[("user", user_id)]).await?;
        body.pointer("/user/tz")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("users.info returned no timezone for {}", user_id))
    }

    async fn respond(&self, response_url: &str, payload: &Value) -> Result<()> {
        let url = url::Url::parse(response_url).context("invalid response_url")?;
        self.http
            .post(url)
            .json(payload)
            .send()
            .await
            .context("response_url POST failed")?
            .error_for_status()
            .context("response_url POST rejected")?;
        Ok(())
    }
}
