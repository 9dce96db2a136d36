//! Conversational agent boundary.
//!
//! The bot never generates reply text itself. Everything that is not a
//! slash command crosses this trait; what the runtime does internally
//! (tools, retrieval, model choice) is its own business and the reply
//! comes back as opaque constrained HTML for the markup converter.

use crate::config::AgentConfig;
use crate::error::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const SERVICE: &str = "agent";

/// One completed agent turn.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentReply {
    pub text: String,
}

/// Boundary between the bot and whatever produces reply text.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Run one turn for `session` and return the reply.
    async fn generate(&self, text: &str, session: &str) -> Result<AgentReply, ApiError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    input: &'a str,
    session: &'a str,
}

/// HTTP-backed runtime posting to a configured completion endpoint.
pub struct HttpAgent {
    client: reqwest::Client,
    config: AgentConfig,
}

impl HttpAgent {
    pub fn new(client: reqwest::Client, config: AgentConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl AgentRuntime for HttpAgent {
    async fn generate(&self, text: &str, session: &str) -> Result<AgentReply, ApiError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&GenerateRequest {
                input: text,
                session,
            })
            .send()
            .await
            .map_err(|e| ApiError::request(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<AgentReply>()
            .await
            .map_err(|e| ApiError::decode(SERVICE, e))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Canned agent for exercising the handlers without a network.

    use super::*;
    use parking_lot::Mutex;

    pub struct CannedAgent {
        replies: Mutex<Vec<String>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl CannedAgent {
        pub fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().map(str::to_string).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AgentRuntime for CannedAgent {
        async fn generate(&self, text: &str, _session: &str) -> Result<AgentReply, ApiError> {
            self.prompts.lock().push(text.to_string());
            let text = self.replies.lock().pop().unwrap_or_default();
            Ok(AgentReply { text })
        }
    }
}
