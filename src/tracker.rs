//! Issue tracker REST client.
//!
//! Thin typed wrapper over the tracker's HTTP API. Each operation is one
//! request; callers render the returned structs into chat markup.

use crate::config::TrackerConfig;
use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SERVICE: &str = "tracker";

/// An issue as the tracker reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    /// Human-facing key, e.g. `ENG-142`.
    pub key: String,
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    pub url: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: String,
    pub body: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct CreateIssueRequest<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct AddCommentRequest<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateStateRequest<'a> {
    state: &'a str,
}

#[derive(Debug, Deserialize)]
struct IssueList {
    issues: Vec<Issue>,
}

/// Client over the issue tracker API.
pub struct IssueTracker {
    client: reqwest::Client,
    config: TrackerConfig,
}

impl IssueTracker {
    pub fn new(client: reqwest::Client, config: TrackerConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Issues assigned to the bot's owner, most recently updated first.
    pub async fn list_issues(&self) -> Result<Vec<Issue>, ApiError> {
        let response = self
            .client
            .get(self.url("issues"))
            .bearer_auth(&self.config.api_key)
            .query(&[("order", "updated")])
            .send()
            .await
            .map_err(|e| ApiError::request(SERVICE, e))?;
        let list: IssueList = decode(response).await?;
        Ok(list.issues)
    }

    pub async fn get_issue(&self, key: &str) -> Result<Issue, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("issues/{key}")))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| ApiError::request(SERVICE, e))?;
        decode(response).await
    }

    pub async fn create_issue(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> Result<Issue, ApiError> {
        let response = self
            .client
            .post(self.url("issues"))
            .bearer_auth(&self.config.api_key)
            .json(&CreateIssueRequest { title, description })
            .send()
            .await
            .map_err(|e| ApiError::request(SERVICE, e))?;
        decode(response).await
    }

    pub async fn add_comment(&self, key: &str, body: &str) -> Result<Comment, ApiError> {
        let response = self
            .client
            .post(self.url(&format!("issues/{key}/comments")))
            .bearer_auth(&self.config.api_key)
            .json(&AddCommentRequest { body })
            .send()
            .await
            .map_err(|e| ApiError::request(SERVICE, e))?;
        decode(response).await
    }

    pub async fn update_state(&self, key: &str, state: &str) -> Result<Issue, ApiError> {
        let response = self
            .client
            .patch(self.url(&format!("issues/{key}")))
            .bearer_auth(&self.config.api_key)
            .json(&UpdateStateRequest { state })
            .send()
            .await
            .map_err(|e| ApiError::request(SERVICE, e))?;
        decode(response).await
    }
}

/// Check the status line, then deserialize the body.
async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            service: SERVICE,
            status: status.as_u16(),
            body,
        });
    }
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::request(SERVICE, e))?;
    serde_json::from_str(&body).map_err(|e| ApiError::decode(SERVICE, e))
}
