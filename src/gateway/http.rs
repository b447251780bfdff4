// src/gateway/http.rs — reqwest implementation of SocialGateway
//
// Speaks a Twitter-v2-shaped REST API. Status mapping: 429 becomes
// RateLimited (with the retry-after hint when present), 5xx a retriable
// gateway error, everything else non-retriable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{FollowerPage, Session, SocialGateway, UserRecord};
use crate::infra::config::GatewayConfig;
use crate::infra::errors::FlockError;

const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    page_size: u32,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, FlockError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(0);
            return Err(FlockError::RateLimited { retry_after_ms });
        }

        let body = response.text().await.unwrap_or_default();
        Err(FlockError::Gateway {
            message: format!("HTTP {status}: {}", snippet(&body)),
            retriable: status.is_server_error(),
        })
    }
}

fn transport(e: reqwest::Error) -> FlockError {
    FlockError::Gateway {
        message: e.to_string(),
        retriable: true,
    }
}

fn snippet(body: &str) -> &str {
    let end = body
        .char_indices()
        .take(200)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    &body[..end]
}

// -- Wire types --

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    username: String,
    #[serde(default)]
    verified: bool,
}

impl From<WireUser> for UserRecord {
    fn from(u: WireUser) -> Self {
        UserRecord {
            id: u.id,
            screen_name: u.username,
            verified: u.verified,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    data: Option<WireUser>,
}

#[derive(Debug, Deserialize)]
struct UsersEnvelope {
    #[serde(default)]
    data: Vec<WireUser>,
}

#[derive(Debug, Default, Deserialize)]
struct PageMeta {
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FollowersEnvelope {
    #[serde(default)]
    data: Vec<WireUser>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Debug, Deserialize)]
struct WireTweet {
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TweetsEnvelope {
    #[serde(default)]
    data: Vec<WireTweet>,
}

#[derive(Debug, Serialize)]
struct FollowBody<'a> {
    target_user_id: &'a str,
}

#[async_trait]
impl SocialGateway for HttpGateway {
    async fn resolve_user(
        &self,
        session: &Session,
        handle: &str,
    ) -> Result<Option<UserRecord>, FlockError> {
        let response = self
            .client
            .get(self.url(&format!("/2/users/by/username/{handle}")))
            .bearer_auth(&session.bearer_token)
            .query(&[("user.fields", "verified")])
            .send()
            .await
            .map_err(transport)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let envelope: UserEnvelope = Self::check(response)
            .await?
            .json()
            .await
            .map_err(transport)?;
        Ok(envelope.data.map(UserRecord::from))
    }

    async fn list_followers(
        &self,
        session: &Session,
        user_id: &str,
        page_token: Option<&str>,
    ) -> Result<FollowerPage, FlockError> {
        let mut request = self
            .client
            .get(self.url(&format!("/2/users/{user_id}/followers")))
            .bearer_auth(&session.bearer_token)
            .query(&[("max_results", self.page_size.to_string())]);
        if let Some(token) = page_token {
            request = request.query(&[("pagination_token", token)]);
        }

        let response = request.send().await.map_err(transport)?;
        let envelope: FollowersEnvelope = Self::check(response)
            .await?
            .json()
            .await
            .map_err(transport)?;

        Ok(FollowerPage {
            ids: envelope.data.into_iter().map(|u| u.id).collect(),
            next_token: envelope.meta.next_token,
        })
    }

    async fn get_users(
        &self,
        session: &Session,
        ids: &[String],
    ) -> Result<Vec<UserRecord>, FlockError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .get(self.url("/2/users"))
            .bearer_auth(&session.bearer_token)
            .query(&[("ids", ids.join(",")), ("user.fields", "verified".into())])
            .send()
            .await
            .map_err(transport)?;

        let envelope: UsersEnvelope = Self::check(response)
            .await?
            .json()
            .await
            .map_err(transport)?;
        Ok(envelope.data.into_iter().map(UserRecord::from).collect())
    }

    async fn recent_activity(
        &self,
        session: &Session,
        user_id: &str,
    ) -> Result<Option<DateTime<Utc>>, FlockError> {
        let response = self
            .client
            .get(self.url(&format!("/2/users/{user_id}/tweets")))
            .bearer_auth(&session.bearer_token)
            .query(&[("max_results", "5"), ("tweet.fields", "created_at")])
            .send()
            .await
            .map_err(transport)?;

        let envelope: TweetsEnvelope = Self::check(response)
            .await?
            .json()
            .await
            .map_err(transport)?;

        let created_at = envelope
            .data
            .first()
            .and_then(|t| t.created_at.as_deref())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));
        Ok(created_at)
    }

    async fn follow(&self, session: &Session, user_id: &str) -> Result<(), FlockError> {
        let response = self
            .client
            .post(self.url(&format!("/2/users/{}/following", session.account_id)))
            .bearer_auth(&session.bearer_token)
            .json(&FollowBody {
                target_user_id: user_id,
            })
            .send()
            .await
            .map_err(transport)?;

        Self::check(response).await?;
        Ok(())
    }

    async fn unfollow(&self, session: &Session, user_id: &str) -> Result<(), FlockError> {
        let response = self
            .client
            .delete(self.url(&format!(
                "/2/users/{}/following/{user_id}",
                session.account_id
            )))
            .bearer_auth(&session.bearer_token)
            .send()
            .await
            .map_err(transport)?;

        Self::check(response).await?;
        Ok(())
    }
}
