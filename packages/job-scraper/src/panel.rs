//! The operator's control surface: start/stop for the automated loop and a
//! manual single-locator panel for ad hoc inspection.
//!
//! The panel never drives the workflow itself; it only flips the run flag
//! the orchestrator polls between iterations and issues one-off commands
//! over the same correlated client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use relay::correlation::CorrelationClient;
use relay::error::RelayError;
use relay::protocol::{Action, ExecuteResult, FetchKind, Locator, PageCommand};
use relay::relay::RelayTrigger;
use tokio::sync::mpsc;

pub struct ControlPanel {
    run_flag: Arc<AtomicBool>,
    client: CorrelationClient,
    triggers: mpsc::Sender<RelayTrigger>,
}

impl ControlPanel {
    pub fn new(client: CorrelationClient, triggers: mpsc::Sender<RelayTrigger>) -> Self {
        Self {
            run_flag: Arc::new(AtomicBool::new(false)),
            client,
            triggers,
        }
    }

    /// The flag the orchestrator polls between iterations.
    pub fn run_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.run_flag)
    }

    pub fn start(&self) {
        self.run_flag.store(true, Ordering::SeqCst);
        tracing::info!("scrape loop started");
    }

    /// Clears the flag; an in-flight iteration still runs to completion.
    pub fn stop(&self) {
        self.run_flag.store(false, Ordering::SeqCst);
        tracing::info!("scrape loop stopping after current iteration");
    }

    pub fn is_running(&self) -> bool {
        self.run_flag.load(Ordering::SeqCst)
    }

    /// Ask the relay to highlight every element on the active page.
    pub async fn highlight_all(&self) -> anyhow::Result<()> {
        self.triggers.send(RelayTrigger::HighlightAll).await?;
        Ok(())
    }

    pub async fn clear_highlight(&self) -> anyhow::Result<()> {
        self.triggers.send(RelayTrigger::ClearHighlight).await?;
        Ok(())
    }

    /// Highlight without a reply, targeting one locator's page.
    pub fn highlight(&self, locator: Locator) {
        self.client.send_uncorrelated(PageCommand::Highlight { locator });
    }

    /// One correlated command from the manual panel.
    pub async fn inspect(
        &self,
        locator: Locator,
        action: Action,
        value: Option<String>,
        fetch: Option<FetchKind>,
        window: Duration,
    ) -> Result<ExecuteResult, RelayError> {
        self.client
            .execute_timeout(locator, action, value, fetch, window)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay::bus::MessageBus;

    #[tokio::test]
    async fn test_start_stop_flip_shared_flag() {
        let (tx, _rx) = mpsc::channel(4);
        let panel = ControlPanel::new(CorrelationClient::new(MessageBus::new()), tx);
        let flag = panel.run_flag();

        assert!(!panel.is_running());
        panel.start();
        assert!(flag.load(Ordering::SeqCst));
        panel.stop();
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_highlight_all_reaches_relay_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let panel = ControlPanel::new(CorrelationClient::new(MessageBus::new()), tx);

        panel.highlight_all().await.unwrap();
        assert_eq!(rx.recv().await, Some(RelayTrigger::HighlightAll));
    }
}
