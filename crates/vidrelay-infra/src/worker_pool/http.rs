use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use vidrelay_core::models::Task;
use vidrelay_core::{WorkerPool, WorkerPoolError};

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct ActiveWorkers {
    active: usize,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    tasks: &'a [Task],
}

/// Worker pool reached over its HTTP control API.
///
/// `GET {base}/workers?class=..&status=running` answers `{"active": n}`;
/// `POST {base}/tasks` takes `{"tasks": [...]}` and accepts with any 2xx.
#[derive(Clone, Debug)]
pub struct HttpWorkerPool {
    client: Client,
    base_url: String,
}

impl HttpWorkerPool {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create worker pool HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn parse_active(body: &str) -> Result<usize, WorkerPoolError> {
    serde_json::from_str::<ActiveWorkers>(body)
        .map(|r| r.active)
        .map_err(|e| WorkerPoolError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl WorkerPool for HttpWorkerPool {
    #[tracing::instrument(skip(self), fields(worker_pool.class = %class))]
    async fn count_active(&self, class: &str) -> Result<usize, WorkerPoolError> {
        let response = self
            .client
            .get(self.url("/workers"))
            .query(&[("class", class), ("status", "running")])
            .send()
            .await
            .map_err(|e| WorkerPoolError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| WorkerPoolError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(WorkerPoolError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let active = parse_active(&body)?;
        tracing::debug!(active = active, "Worker pool occupancy");
        Ok(active)
    }

    #[tracing::instrument(skip(self, tasks), fields(worker_pool.batch = tasks.len()))]
    async fn submit(&self, tasks: &[Task]) -> Result<bool, WorkerPoolError> {
        let response = self
            .client
            .post(self.url("/tasks"))
            .json(&SubmitRequest { tasks })
            .send()
            .await
            .map_err(|e| WorkerPoolError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(tasks = tasks.len(), "Tasks submitted to worker pool");
            return Ok(true);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        tracing::warn!(
            status = status.as_u16(),
            body = %body,
            tasks = tasks.len(),
            "Worker pool declined submission"
        );
        Ok(false)
    }
}
