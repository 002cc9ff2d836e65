//! The scraping workflow: a looping state machine driven entirely through
//! correlated commands.
//!
//! One iteration opens the current list item, waits for the detail surface,
//! extracts every field sequentially, dismisses the posting, waits for the
//! list surface to return, and submits the assembled draft. The run flag is
//! polled between iterations only; an in-flight iteration always runs to
//! completion.
//!
//! Failure policy: a failed field fetch degrades that field to its empty
//! default, a failed submission is logged and the loop continues, and only
//! marker-poll exhaustion ends the run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use relay::correlation::CorrelationClient;
use relay::protocol::{Action, FetchKind, Locator};

use crate::config::ScrapeConfig;
use crate::draft::{Company, JobDraft};
use crate::fields;
use crate::submit::JobStore;

/// Workflow states, advanced strictly in order within an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeState {
    Idle,
    OpenDetail,
    AwaitDetail,
    Extracting,
    Dismiss,
    AwaitList,
    Assemble,
}

/// Counters reported when a run ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub iterations: u32,
    pub submitted: u32,
    pub failed_submissions: u32,
}

pub struct Orchestrator<S: JobStore> {
    client: CorrelationClient,
    config: ScrapeConfig,
    store: S,
    run_flag: Arc<AtomicBool>,
    state: ScrapeState,
}

impl<S: JobStore> Orchestrator<S> {
    pub fn new(
        client: CorrelationClient,
        config: ScrapeConfig,
        store: S,
        run_flag: Arc<AtomicBool>,
    ) -> Self {
        Self {
            client,
            config,
            store,
            run_flag,
            state: ScrapeState::Idle,
        }
    }

    pub fn state(&self) -> ScrapeState {
        self.state
    }

    /// Loop iterations while the run flag stays set. Marker-poll exhaustion
    /// ends the run with an error log rather than crashing the process.
    pub async fn run(&mut self) -> RunStats {
        let mut stats = RunStats::default();

        while self.run_flag.load(Ordering::SeqCst) {
            match self.run_iteration(&mut stats).await {
                Ok(()) => {
                    stats.iterations += 1;
                    tracing::debug!(iterations = stats.iterations, "iteration complete");
                }
                Err(e) => {
                    tracing::error!(error = %e, "iteration failed, ending run");
                    break;
                }
            }
        }

        self.state = ScrapeState::Idle;
        tracing::info!(
            iterations = stats.iterations,
            submitted = stats.submitted,
            failed = stats.failed_submissions,
            "scrape run finished"
        );
        stats
    }

    async fn run_iteration(&mut self, stats: &mut RunStats) -> anyhow::Result<()> {
        self.state = ScrapeState::OpenDetail;
        self.click(self.config.list_item.clone()).await;

        self.state = ScrapeState::AwaitDetail;
        let marker = self.config.detail_marker.clone();
        self.wait_for_surface(&marker, "detail").await?;

        self.state = ScrapeState::Extracting;
        let draft = self.extract().await;

        self.state = ScrapeState::Dismiss;
        self.dismiss().await;

        self.state = ScrapeState::AwaitList;
        let marker = self.config.list_marker.clone();
        self.wait_for_surface(&marker, "list").await?;

        self.state = ScrapeState::Assemble;
        tracing::info!(title = %draft.title, company = %draft.company.name, "draft assembled");
        match self.store.submit(&draft).await {
            Ok(()) => stats.submitted += 1,
            Err(e) => {
                stats.failed_submissions += 1;
                tracing::warn!(error = %e, title = %draft.title, "submission failed, continuing");
            }
        }
        Ok(())
    }

    /// Poll a marker element until a fetch against it succeeds.
    ///
    /// Returns the number of attempts taken. Both the detail and the list
    /// wait share this bounded policy.
    async fn wait_for_surface(&self, marker: &Locator, surface: &str) -> anyhow::Result<u32> {
        for attempt in 1..=self.config.poll_attempts {
            if self.marker_present(marker).await {
                tracing::debug!(surface, attempt, "surface ready");
                return Ok(attempt);
            }
            tokio::time::sleep(self.config.poll_delay()).await;
        }
        anyhow::bail!(
            "{surface} surface did not appear after {} attempts",
            self.config.poll_attempts
        )
    }

    async fn marker_present(&self, marker: &Locator) -> bool {
        match self
            .client
            .execute_timeout(
                marker.clone(),
                Action::Fetch,
                None,
                Some(FetchKind::Text),
                self.config.command_timeout(),
            )
            .await
        {
            Ok(result) => result.success,
            Err(e) => {
                tracing::debug!(error = %e, locator = %marker, "marker poll got no reply");
                false
            }
        }
    }

    /// Sequential correlated fetches for every field, each degrading to its
    /// empty default on failure.
    async fn extract(&self) -> JobDraft {
        let f = self.config.fields.clone();

        let apply_markup = self.fetch_content(&f.apply_link).await;
        let applicant_text = self.fetch_text(&f.applicant_tags).await;
        let company_markup = self.fetch_content(&f.company_line).await;
        let title = self.fetch_text(&f.title).await;
        let details_markup = self.fetch_content(&f.details_row).await;
        let summary = self.fetch_text(&f.summary).await;
        let company_tags_markup = self.fetch_content(&f.company_tags).await;
        let responsibilities = self.fetch_text(&f.responsibilities).await;
        let qualifications = self.fetch_text(&f.qualifications).await;
        let benefits = self.fetch_text(&f.benefits).await;
        let skills_text = self.fetch_text(&f.skills).await;

        let (company_name, posted_ago) = fields::company_line(&company_markup);
        let applicants = fields::applicants(&applicant_text);
        // The applicant line is metadata, not a tag.
        let tags = fields::lines(&applicant_text)
            .into_iter()
            .filter(|line| line != &applicants.text)
            .collect();

        JobDraft {
            apply_link: fields::apply_link(&apply_markup),
            posted_ago,
            tags,
            company: Company {
                name: company_name,
                tags: fields::tag_list(&company_tags_markup),
            },
            title,
            details: fields::detail_map(&details_markup),
            applicants,
            description: fields::join_sections(&[
                &summary,
                &responsibilities,
                &qualifications,
                &benefits,
            ]),
            skills: fields::lines(&skills_text),
        }
    }

    /// Open the dismissal control, pick the configured reason, confirm.
    async fn dismiss(&self) {
        let plan = self.config.dismissal.clone();

        self.click(plan.open_control.clone()).await;
        tokio::time::sleep(self.config.dismiss_delay()).await;

        match plan.default_reason_locator() {
            Some(reason) => self.click(reason.clone()).await,
            None => tracing::warn!("dismissal plan has no reasons configured"),
        }
        tokio::time::sleep(self.config.dismiss_delay()).await;

        self.click(plan.confirm).await;
        tokio::time::sleep(self.config.dismiss_delay()).await;
    }

    async fn click(&self, locator: Locator) {
        match self
            .client
            .execute_timeout(
                locator.clone(),
                Action::Click,
                None,
                None,
                self.config.command_timeout(),
            )
            .await
        {
            Ok(result) if !result.success => {
                tracing::warn!(locator = %locator, error = ?result.error, "click missed");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(locator = %locator, error = %e, "click got no reply"),
        }
    }

    async fn fetch_text(&self, locator: &Locator) -> String {
        match self
            .client
            .execute_timeout(
                locator.clone(),
                Action::Fetch,
                None,
                Some(FetchKind::Text),
                self.config.command_timeout(),
            )
            .await
        {
            Ok(result) => {
                if !result.success {
                    tracing::warn!(locator = %locator, error = ?result.error, "text fetch failed, using empty");
                }
                result.data_or_default()
            }
            Err(e) => {
                tracing::warn!(locator = %locator, error = %e, "text fetch got no reply, using empty");
                String::new()
            }
        }
    }

    async fn fetch_content(&self, locator: &Locator) -> String {
        match self
            .client
            .execute_timeout(
                locator.clone(),
                Action::Fetch,
                None,
                Some(FetchKind::Content),
                self.config.command_timeout(),
            )
            .await
        {
            Ok(result) => {
                if !result.success {
                    tracing::warn!(locator = %locator, error = ?result.error, "content fetch failed, using empty");
                }
                result.data_or_default()
            }
            Err(e) => {
                tracing::warn!(locator = %locator, error = %e, "content fetch got no reply, using empty");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use page_agent::testing::ScriptedPage;
    use page_agent::DomAgent;
    use relay::bus::{BusMessage, MessageBus};
    use relay::protocol::ExecuteResult;
    use relay::relay::Relay;
    use tokio::sync::mpsc;

    /// Records submitted drafts; optionally clears the run flag on first
    /// submission so a run covers exactly one iteration.
    struct RecordingStore {
        drafts: Mutex<Vec<JobDraft>>,
        stop_after_submit: Option<Arc<AtomicBool>>,
    }

    impl RecordingStore {
        fn stopping(flag: Arc<AtomicBool>) -> Self {
            Self {
                drafts: Mutex::new(Vec::new()),
                stop_after_submit: Some(flag),
            }
        }
    }

    #[async_trait]
    impl JobStore for RecordingStore {
        async fn submit(&self, draft: &JobDraft) -> anyhow::Result<()> {
            self.drafts.lock().unwrap().push(draft.clone());
            if let Some(flag) = &self.stop_after_submit {
                flag.store(false, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    fn fast_config() -> ScrapeConfig {
        ScrapeConfig {
            poll_attempts: 10,
            poll_delay_ms: 5,
            command_timeout_ms: 500,
            dismiss_delay_ms: 1,
            ..ScrapeConfig::default()
        }
    }

    /// Answers every correlated command on the bus: the first `failures`
    /// replies are unsuccessful, the rest succeed. Counts replies sent.
    fn spawn_flaky_responder(bus: &MessageBus, failures: u32) -> Arc<AtomicU32> {
        let seen = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&seen);
        let mut rx = bus.subscribe();
        let bus = bus.clone();
        tokio::spawn(async move {
            while let Ok(msg) = rx.recv().await {
                if let BusMessage::Command(cmd) = msg {
                    if let Some(id) = cmd.request_id() {
                        let n = counter.fetch_add(1, Ordering::SeqCst);
                        if n < failures {
                            bus.emit_result(ExecuteResult::fail(id, "not yet"));
                        } else {
                            bus.emit_result(ExecuteResult::ok(id, "ready"));
                        }
                    }
                }
            }
        });
        seen
    }

    #[tokio::test]
    async fn test_list_wait_takes_exactly_six_attempts() {
        let bus = MessageBus::new();
        let attempts_seen = spawn_flaky_responder(&bus, 5);
        let client = CorrelationClient::new(bus.clone());
        tokio::task::yield_now().await;

        let flag = Arc::new(AtomicBool::new(false));
        let orchestrator = Orchestrator::new(
            client,
            fast_config(),
            RecordingStore::stopping(Arc::clone(&flag)),
            flag,
        );

        let marker = orchestrator.config.list_marker.clone();
        let attempts = orchestrator
            .wait_for_surface(&marker, "list")
            .await
            .unwrap();

        assert_eq!(attempts, 6);
        assert_eq!(attempts_seen.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_wait_exhaustion_is_an_error() {
        let bus = MessageBus::new();
        // Never succeeds.
        spawn_flaky_responder(&bus, u32::MAX);
        let client = CorrelationClient::new(bus.clone());
        tokio::task::yield_now().await;

        let flag = Arc::new(AtomicBool::new(false));
        let config = ScrapeConfig {
            poll_attempts: 3,
            ..fast_config()
        };
        let orchestrator = Orchestrator::new(
            client,
            config,
            RecordingStore::stopping(Arc::clone(&flag)),
            flag,
        );

        let marker = orchestrator.config.detail_marker.clone();
        let err = orchestrator
            .wait_for_surface(&marker, "detail")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("3 attempts"));
    }

    const LIST_PAGE: &str = r#"<body>
        <ul class="jobs-list"><li class="job-card">Senior Rust Engineer - Acme Robotics</li></ul>
    </body>"#;

    const DETAIL_PAGE: &str = r#"<body>
        <div class="job-detail">
            <h1 class="top-title">Senior Rust Engineer</h1>
            <div class="apply-box"><a href="https://jobs.example/apply/42">Apply</a></div>
            <div class="applicant-info"><span>23 applicants</span><span>Remote</span><span>Full-time</span></div>
            <div class="company-row"><span>Acme Robotics</span><span> · 3 days ago</span></div>
            <ul class="details-row">
                <li><span aria-label="Location"></span><span>Remote, US</span></li>
                <li><span aria-label="Seniority"></span><span>Senior</span></li>
            </ul>
            <p class="summary">Build scraping infrastructure.</p>
            <ul class="company-tags"><li>Robotics</li><li>Series B</li></ul>
            <div class="sec-responsibilities">Own the pipeline.</div>
            <div class="sec-qualifications">5 years Rust.</div>
            <div class="sec-benefits">Health cover.</div>
            <div class="skills-block"><span>Rust</span><span>Tokio</span></div>
            <button class="dismiss-open">Not interested</button>
        </div>
    </body>"#;

    const DISMISS_PAGE: &str = r#"<body>
        <div class="job-detail">
            <ul class="dismiss-menu">
                <li class="reason-not-interested">Not interested</li>
                <li class="reason-already-applied">Already applied</li>
            </ul>
            <button class="dismiss-confirm">Confirm</button>
        </div>
    </body>"#;

    fn scripted_listing_site(config: &ScrapeConfig) -> ScriptedPage {
        ScriptedPage::new(LIST_PAGE)
            .on_click(config.list_item.clone(), vec![DETAIL_PAGE])
            .on_click(config.dismissal.open_control.clone(), vec![DISMISS_PAGE])
            .on_click(config.dismissal.confirm.clone(), vec![LIST_PAGE])
    }

    #[tokio::test]
    async fn test_full_iteration_assembles_and_submits_draft() {
        let panel_bus = MessageBus::new();
        let page_bus = MessageBus::new();
        let config = fast_config();

        let agent = DomAgent::new(scripted_listing_site(&config));
        tokio::spawn(agent.run(page_bus.clone()));

        let (_trigger_tx, trigger_rx) = mpsc::channel(4);
        tokio::spawn(Relay::new(panel_bus.clone(), page_bus.clone()).run(trigger_rx));

        let client = CorrelationClient::new(panel_bus.clone());
        tokio::task::yield_now().await;

        let flag = Arc::new(AtomicBool::new(true));
        let store = RecordingStore::stopping(Arc::clone(&flag));
        let mut orchestrator = Orchestrator::new(client, config, store, flag);

        let stats = orchestrator.run().await;
        assert_eq!(stats.iterations, 1);
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.failed_submissions, 0);
        assert_eq!(orchestrator.state(), ScrapeState::Idle);

        let drafts = orchestrator.store.drafts.lock().unwrap();
        let draft = &drafts[0];
        assert_eq!(draft.title, "Senior Rust Engineer");
        assert_eq!(draft.apply_link, "https://jobs.example/apply/42");
        assert_eq!(draft.company.name, "Acme Robotics");
        assert_eq!(draft.company.tags, vec!["Robotics", "Series B"]);
        assert_eq!(draft.posted_ago, "3 days ago");
        assert_eq!(draft.applicants.count, 23);
        assert_eq!(draft.applicants.text, "23 applicants");
        assert_eq!(draft.tags, vec!["Remote", "Full-time"]);
        assert_eq!(
            draft.details.get("Location").map(String::as_str),
            Some("Remote, US")
        );
        assert_eq!(
            draft.details.get("Seniority").map(String::as_str),
            Some("Senior")
        );
        assert_eq!(draft.skills, vec!["Rust", "Tokio"]);
        assert_eq!(
            draft.description,
            "Build scraping infrastructure.\n\nOwn the pipeline.\n\n5 years Rust.\n\nHealth cover."
        );
    }

    #[tokio::test]
    async fn test_submission_failure_does_not_abort_the_loop() {
        struct FailingStore {
            flag: Arc<AtomicBool>,
        }

        #[async_trait]
        impl JobStore for FailingStore {
            async fn submit(&self, _draft: &JobDraft) -> anyhow::Result<()> {
                self.flag.store(false, Ordering::SeqCst);
                anyhow::bail!("store unavailable")
            }
        }

        let panel_bus = MessageBus::new();
        let page_bus = MessageBus::new();
        let config = fast_config();

        let agent = DomAgent::new(scripted_listing_site(&config));
        tokio::spawn(agent.run(page_bus.clone()));
        let (_trigger_tx, trigger_rx) = mpsc::channel(4);
        tokio::spawn(Relay::new(panel_bus.clone(), page_bus.clone()).run(trigger_rx));

        let client = CorrelationClient::new(panel_bus.clone());
        tokio::task::yield_now().await;

        let flag = Arc::new(AtomicBool::new(true));
        let store = FailingStore {
            flag: Arc::clone(&flag),
        };
        let mut orchestrator = Orchestrator::new(client, config, store, flag);

        let stats = orchestrator.run().await;
        // The iteration completed despite the failed submission.
        assert_eq!(stats.iterations, 1);
        assert_eq!(stats.submitted, 0);
        assert_eq!(stats.failed_submissions, 1);
    }
}
