use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use tokio::{sync::Mutex, task::JoinHandle, time};

use crate::db::Database;
use crate::detector::{ThresholdCache, TickReport};
use crate::emotion::FrameOutcome;
use crate::engine::{EngagementStatus, LearningSession, RemediationRequest};
use crate::intervention::{AnswerOutcome, InterventionAction, InterventionView, TransitionError};
use crate::remediation::{RemediationError, RemediationKind, RemediationSource};
use crate::{log_debug, log_info, log_warn};

use super::events::{EngagementEvent, EngagementTickEvent, EventSink};
use super::telemetry;

const ENABLE_LOGS: bool = true;

/// Async front for one [`LearningSession`]. Cheap to clone; every clone drives
/// the same session.
#[derive(Clone)]
pub struct EngagementController {
    session: Arc<Mutex<LearningSession>>,
    remediation: Arc<dyn RemediationSource>,
    events: Arc<dyn EventSink>,
    threshold: ThresholdCache,
    telemetry: Option<Database>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
}

impl EngagementController {
    pub fn new(
        session: LearningSession,
        remediation: Arc<dyn RemediationSource>,
        events: Arc<dyn EventSink>,
        threshold: ThresholdCache,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            remediation,
            events,
            threshold,
            telemetry: None,
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: Duration::from_secs(1),
        }
    }

    /// Records one sample per live tick into `db`.
    pub fn with_telemetry(mut self, db: Database) -> Self {
        self.telemetry = Some(db);
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn threshold(&self) -> u32 {
        self.threshold.current()
    }

    pub fn events(&self) -> Arc<dyn EventSink> {
        self.events.clone()
    }

    pub async fn status(&self) -> EngagementStatus {
        let threshold = self.threshold.current();
        self.session.lock().await.status(threshold)
    }

    pub async fn session_id(&self) -> String {
        self.session.lock().await.id().to_string()
    }

    pub async fn set_topic(&self, topic: &str) -> Result<()> {
        let topic = topic.trim();
        if topic.is_empty() {
            bail!("lesson topic must not be empty");
        }
        self.session.lock().await.set_topic(topic);
        log_info!("Lesson topic set to {topic:?}");
        Ok(())
    }

    pub async fn on_frame(&self, raw: &str) -> FrameOutcome {
        let outcome = self.session.lock().await.on_frame(raw);
        match &outcome {
            FrameOutcome::Warning { message } => {
                self.events.emit(EngagementEvent::provider_warning(message.clone()));
            }
            FrameOutcome::ProviderError { message } => {
                log_warn!("Emotion provider reported an error: {message}");
                self.events.emit(EngagementEvent::provider_warning(message.clone()));
            }
            FrameOutcome::Malformed => log_debug!("Ignoring malformed provider frame"),
            FrameOutcome::Ignored => log_debug!("Ignoring scores received while capture is off"),
            FrameOutcome::Updated { .. } | FrameOutcome::Empty => {}
        }
        outcome
    }

    pub async fn set_capture_active(&self, active: bool) {
        self.session.lock().await.set_capture_active(active);
    }

    /// Camera went away; the detector stops classifying until capture resumes.
    pub async fn capture_unavailable(&self, reason: &str) {
        self.set_capture_active(false).await;
        log_warn!("Capture unavailable: {reason}");
        self.events.emit(EngagementEvent::capture_unavailable(reason));
    }

    /// One sampling tick against the threshold currently cached.
    pub async fn tick_once(&self) -> TickReport {
        let threshold = self.threshold.current();

        let (report, emotions, opened, session_id, live) = {
            let mut session = self.session.lock().await;
            let report = session.tick(threshold);
            let opened = report.triggered.then(|| session.intervention().view());
            (
                report,
                session.ranked_snapshot(),
                opened,
                session.id().to_string(),
                session.capture_active(),
            )
        };

        if live {
            if let Some(db) = &self.telemetry {
                telemetry::record_sample(db, &session_id, &emotions);
            }
        }

        self.events
            .emit(EngagementEvent::Tick(EngagementTickEvent::new(report, emotions)));
        if let Some(view) = opened {
            self.events.emit(EngagementEvent::InterventionChanged(view));
        }

        report
    }

    pub async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let controller = self.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            // First tick completes immediately; skip it so counting starts one
            // interval after the ticker does.
            interval.tick().await;
            loop {
                interval.tick().await;
                controller.tick_once().await;
            }
        });

        *ticker_guard = Some(handle);
        log_info!("Engagement ticker started ({:?})", tick_interval);
    }

    pub async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
            log_info!("Engagement ticker stopped");
        }
    }

    pub async fn is_ticking(&self) -> bool {
        self.ticker
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn accept(&self) -> Result<InterventionView, TransitionError> {
        self.apply(InterventionAction::Accept).await
    }

    pub async fn decline(&self) -> Result<InterventionView, TransitionError> {
        self.apply(InterventionAction::Decline).await
    }

    /// Enters the chosen sub-flow; content arrives later as an
    /// `intervention-changed` event.
    pub async fn choose(&self, kind: RemediationKind) -> Result<InterventionView, TransitionError> {
        self.apply(InterventionAction::Choose(kind)).await
    }

    pub async fn retry(&self) -> Result<InterventionView, TransitionError> {
        self.apply(InterventionAction::Retry).await
    }

    /// Thumbs up closes the intervention; thumbs down returns to the chooser.
    pub async fn feedback(&self, satisfied: bool) -> Result<InterventionView, TransitionError> {
        let action = if satisfied {
            InterventionAction::Satisfied
        } else {
            InterventionAction::Dissatisfied
        };
        self.apply(action).await
    }

    pub async fn force_close(&self) -> InterventionView {
        match self.apply(InterventionAction::ForceClose).await {
            Ok(view) => view,
            // Force close is accepted from every phase.
            Err(_) => self.session.lock().await.intervention().view(),
        }
    }

    pub async fn answer(&self, option: usize) -> Result<AnswerOutcome, TransitionError> {
        let (outcome, view) = {
            let mut session = self.session.lock().await;
            let outcome = session.answer(option)?;
            (outcome, session.intervention().view())
        };
        self.events.emit(EngagementEvent::InterventionChanged(view));
        Ok(outcome)
    }

    pub async fn hint(&self, query: &str) -> Result<String, RemediationError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RemediationError::Malformed("hint query is empty".into()));
        }
        self.remediation.hint(query).await
    }

    async fn apply(&self, action: InterventionAction) -> Result<InterventionView, TransitionError> {
        let (view, _fetch) = self.apply_with_fetch(action).await?;
        Ok(view)
    }

    /// State change under the lock; any content fetch runs on its own task.
    async fn apply_with_fetch(
        &self,
        action: InterventionAction,
    ) -> Result<(InterventionView, Option<JoinHandle<()>>), TransitionError> {
        let (view, request) = {
            let mut session = self.session.lock().await;
            let request = session.handle(action)?;
            (session.intervention().view(), request)
        };

        log_debug!("Intervention now {}", view.phase.as_str());
        self.events.emit(EngagementEvent::InterventionChanged(view.clone()));

        let fetch = request.map(|request| {
            let controller = self.clone();
            tokio::spawn(async move { controller.run_fetch(request).await })
        });
        Ok((view, fetch))
    }

    async fn run_fetch(&self, request: RemediationRequest) {
        let RemediationRequest { ticket, topic } = request;
        log_info!(
            "Fetching {} content for {topic:?} (request {})",
            ticket.kind.as_str(),
            ticket.epoch
        );

        let result = self
            .remediation
            .fetch(ticket.kind, &topic)
            .await
            .map_err(|err| err.to_string());

        let view = {
            let mut session = self.session.lock().await;
            if !session.deliver(ticket.epoch, result) {
                return;
            }
            session.intervention().view()
        };
        self.events.emit(EngagementEvent::InterventionChanged(view));
    }
}
