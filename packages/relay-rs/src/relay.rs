//! The relay: a stateless pass-through between the control panel's bus and
//! the active page's bus.
//!
//! The relay owns no protocol state - no pending requests, no correlation.
//! It forwards commands panel-side to page-side and results page-side to
//! panel-side without inspecting them, and turns the operator's manual
//! "highlight all" trigger into a `Highlight` command for the active page.

use tokio::sync::{broadcast, mpsc};

use crate::bus::{BusMessage, MessageBus};
use crate::protocol::{Locator, PageCommand};

/// Operator triggers handled by the relay outside the command stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayTrigger {
    /// Highlight every element on the active page.
    HighlightAll,
    /// Clear any highlight overlay on the active page.
    ClearHighlight,
}

/// Callback that brings up the control panel surface. Invoked at most once,
/// when the relay starts with auto-open enabled.
pub type PanelOpener = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

pub struct Relay {
    panel_bus: MessageBus,
    page_bus: MessageBus,
    panel_opener: Option<PanelOpener>,
}

impl Relay {
    pub fn new(panel_bus: MessageBus, page_bus: MessageBus) -> Self {
        Self {
            panel_bus,
            page_bus,
            panel_opener: None,
        }
    }

    /// Configure the control panel to open automatically when the relay
    /// starts. Failures are logged, never retried.
    pub fn with_panel_opener(mut self, opener: PanelOpener) -> Self {
        self.panel_opener = Some(opener);
        self
    }

    /// Forward traffic until both buses close and the trigger channel ends.
    pub async fn run(mut self, mut triggers: mpsc::Receiver<RelayTrigger>) {
        if let Some(open) = self.panel_opener.take() {
            if let Err(e) = open() {
                tracing::warn!(error = %e, "failed to open control panel");
            }
        }

        let mut panel_rx = self.panel_bus.subscribe();
        let mut page_rx = self.page_bus.subscribe();
        let mut panel_open = true;
        let mut page_open = true;
        let mut triggers_open = true;

        loop {
            tokio::select! {
                msg = panel_rx.recv(), if panel_open => match msg {
                    Ok(BusMessage::Command(cmd)) => {
                        self.page_bus.emit_command(cmd);
                    }
                    // Results on the panel side are already home.
                    Ok(BusMessage::Result(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, side = "panel", "relay lagged, commands may be lost");
                    }
                    Err(broadcast::error::RecvError::Closed) => panel_open = false,
                },
                msg = page_rx.recv(), if page_open => match msg {
                    Ok(BusMessage::Result(result)) => {
                        self.panel_bus.emit_result(result);
                    }
                    Ok(BusMessage::Command(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, side = "page", "relay lagged, results may be lost");
                    }
                    Err(broadcast::error::RecvError::Closed) => page_open = false,
                },
                trigger = triggers.recv(), if triggers_open => match trigger {
                    Some(RelayTrigger::HighlightAll) => {
                        // The agent re-scans the whole document; the locator
                        // only anchors the request.
                        self.page_bus.emit_command(PageCommand::Highlight {
                            locator: Locator::new("body", "id", "?"),
                        });
                    }
                    Some(RelayTrigger::ClearHighlight) => {
                        self.page_bus.emit_command(PageCommand::ClearHighlight);
                    }
                    // A closed trigger channel disables this branch so the
                    // select blocks on the buses instead of re-polling it.
                    None => triggers_open = false,
                },
                else => break,
            }

            if !panel_open && !page_open {
                break;
            }
        }

        tracing::debug!("relay stopped");
    }
}
