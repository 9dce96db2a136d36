//! Task-runner service client.
//!
//! Dispatches named background jobs and reads their status back.

use crate::config::RunnerConfig;
use crate::error::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SERVICE: &str = "runner";

#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    /// `queued`, `running`, `succeeded` or `failed`.
    pub status: String,
    #[serde(default)]
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct DispatchRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct JobList {
    jobs: Vec<Job>,
}

/// Client over the task-runner HTTP API.
pub struct TaskRunner {
    client: reqwest::Client,
    config: RunnerConfig,
}

impl TaskRunner {
    pub fn new(client: reqwest::Client, config: RunnerConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Queue a job by name; returns the job record the runner created.
    pub async fn dispatch(&self, name: &str) -> Result<Job, ApiError> {
        let response = self
            .client
            .post(self.url("jobs"))
            .bearer_auth(&self.config.token)
            .json(&DispatchRequest { name })
            .send()
            .await
            .map_err(|e| ApiError::request(SERVICE, e))?;
        decode(response).await
    }

    pub async fn status(&self, job_id: &str) -> Result<Job, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("jobs/{job_id}")))
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| ApiError::request(SERVICE, e))?;
        decode(response).await
    }

    /// Recent jobs, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<Job>, ApiError> {
        let response = self
            .client
            .get(self.url("jobs"))
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| ApiError::request(SERVICE, e))?;
        let list: JobList = decode(response).await?;
        Ok(list.jobs)
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
    use indoc::indoc;

    #[test]
    fn running_job_has_no_finished_timestamp() {
        let json = indoc! {r#"
            {
                "id": "job-9f2",
                "name": "nightly-backup",
                "status": "running",
                "created_at": "2026-08-23T02:00:00Z"
            }
        "#};
        let job: Job = serde_json::from_str(json).expect("should deserialize");
        assert_eq!(job.status, "running");
        assert!(job.finished_at.is_none());
        assert!(job.detail.is_none());
    }
}
