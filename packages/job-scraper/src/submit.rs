//! Submission of completed drafts to the job store.

use async_trait::async_trait;
use anyhow::Context;

use crate::draft::JobDraft;

/// Where completed drafts go. Mocked in workflow tests.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn submit(&self, draft: &JobDraft) -> anyhow::Result<()>;
}

/// Posts each draft as JSON to a configured endpoint.
pub struct HttpJobStore {
    client: reqwest::Client,
    url: String,
}

impl HttpJobStore {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let url = url.into();
        url::Url::parse(&url).with_context(|| format!("invalid submit url: {url}"))?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("building job store http client")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl JobStore for HttpJobStore {
    async fn submit(&self, draft: &JobDraft) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(draft)
            .send()
            .await
            .with_context(|| format!("posting draft to {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("job store rejected draft: {status}");
        }
        tracing::info!(title = %draft.title, %status, "draft submitted");
        Ok(())
    }
}
