//! Source-hosting REST client.
//!
//! Covers the two read paths the bot reports on: open pull requests and
//! the check runs for a commit.

use crate::config::ForgeConfig;
use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::Deserialize;

const SERVICE: &str = "forge";

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub author: String,
    pub state: String,
    #[serde(default)]
    pub draft: bool,
    pub url: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRun {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct CheckRunList {
    check_runs: Vec<CheckRun>,
}

/// Client over the source-hosting API for one configured repository.
pub struct Forge {
    client: reqwest::Client,
    config: ForgeConfig,
}

impl Forge {
    pub fn new(client: reqwest::Client, config: ForgeConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.repo,
            path
        )
    }

    pub async fn list_pull_requests(&self) -> Result<Vec<PullRequest>, ApiError> {
        let response = self
            .client
            .get(self.url("pulls"))
            .bearer_auth(&self.config.token)
            .query(&[("state", "open"), ("sort", "updated"), ("direction", "desc")])
            .send()
            .await
            .map_err(|e| ApiError::request(SERVICE, e))?;
        decode(response).await
    }

    pub async fn check_runs(&self, commit_sha: &str) -> Result<Vec<CheckRun>, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("commits/{commit_sha}/check-runs")))
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| ApiError::request(SERVICE, e))?;
        let list: CheckRunList = decode(response).await?;
        Ok(list.check_runs)
    }
}

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForgeConfig;
    use indoc::indoc;

    #[test]
    fn pull_request_deserializes_without_draft_field() {
        let json = indoc! {r#"
            {
                "number": 318,
                "title": "Fix pagination off-by-one",
                "author": "mira",
                "state": "open",
                "url": "https://forge.example/repo/pull/318",
                "updated_at": "2026-08-22T09:15:00Z"
            }
        "#};
        let pr: PullRequest = serde_json::from_str(json).expect("should deserialize");
        assert_eq!(pr.number, 318);
        assert!(!pr.draft);
    }

    #[test]
    fn repo_urls_include_owner_and_name() {
        let forge = Forge::new(
            reqwest::Client::new(),
            ForgeConfig {
                base_url: "https://api.forge.example".into(),
                token: "t".into(),
                repo: "acme/widgets".into(),
            },
        );
        assert_eq!(
            forge.url("pulls"),
            "https://api.forge.example/repos/acme/widgets/pulls"
        );
    }
}
