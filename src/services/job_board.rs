// src/services/job_board.rs

//! Job-board API client.
//!
//! Maps change events onto the downstream REST API:
//!
//! | Event   | Request              | Body        |
//! |---------|----------------------|-------------|
//! | New     | `POST /jobs`         | job as JSON |
//! | Updated | `PUT /jobs/{id}`     | job as JSON |
//! | Stopped | `DELETE /jobs/{id}`  | none        |

use async_trait::async_trait;
use reqwest::{Client, Request, StatusCode};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ApiConfig, ChangeEvent};
use crate::utils::url::join_segments;

/// Longest response body excerpt kept in error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Downstream consumer of change events.
#[async_trait]
pub trait JobBoard: Send + Sync {
    /// Apply one change downstream. Unknown events are a no-op.
    async fn apply(&self, event: &ChangeEvent) -> Result<()>;
}

/// HTTP client for the job-board API.
pub struct JobBoardClient {
    client: Client,
    jobs_url: Url,
    token: Option<String>,
    check_status: bool,
}

impl JobBoardClient {
    pub fn new(client: Client, config: &ApiConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)?;
        Ok(Self {
            client,
            jobs_url: join_segments(&base, &["jobs"])?,
            token: config.token.clone(),
            check_status: config.check_status,
        })
    }

    /// Per-job endpoint, `{base}/jobs/{id}`.
    pub fn job_url(&self, id: &str) -> Result<Url> {
        join_segments(&self.jobs_url, &[id])
    }

    /// Build the request for an event, or `None` for unknown events.
    pub fn build_request(&self, event: &ChangeEvent) -> Result<Option<Request>> {
        let builder = match event {
            ChangeEvent::New { job, .. } => self.client.post(self.jobs_url.clone()).json(job),
            ChangeEvent::Updated { id, job } => self.client.put(self.job_url(id)?).json(job),
            ChangeEvent::Stopped { id } => self.client.delete(self.job_url(id)?),
            ChangeEvent::Unknown => return Ok(None),
        };

        let builder = match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        Ok(Some(builder.build()?))
    }
}

#[async_trait]
impl JobBoard for JobBoardClient {
    async fn apply(&self, event: &ChangeEvent) -> Result<()> {
        let Some(request) = self.build_request(event)? else {
            log::debug!("Skipping event of unknown kind");
            return Ok(());
        };

        let id = event.id().unwrap_or_default();
        let method = request.method().clone();
        let url = request.url().clone();

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| AppError::dispatch(id, e))?;

        let status = response.status();
        log::debug!("{} {} -> {}", method, url, status);

        if self.check_status && !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            let message = format!("{} {}: {}", method, url, excerpt);
            return Err(if is_retryable(status) {
                AppError::dispatch(id, format!("HTTP {} from {}", status.as_u16(), message))
            } else {
                AppError::rejected(id, status.as_u16(), message)
            });
        }

        Ok(())
    }
}

/// Client errors other than timeouts and rate limits won't change on retry.
fn is_retryable(status: StatusCode) -> bool {
    !status.is_client_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}
