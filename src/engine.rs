//! The learner's session context: one owner for the emotion snapshot, the
//! disengagement counter and the intervention state machine.
//!
//! Everything here is synchronous and runs to completion; the async runtime in
//! [`crate::session`] serializes calls behind a single lock.

use log::{info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::detector::{DetectorConfig, DisengagementDetector, TickReport};
use crate::emotion::{EmotionIngestor, FrameOutcome, RankedEmotion};
use crate::intervention::{
    AnswerOutcome, ContentState, FetchTicket, InterventionAction, InterventionSession,
    InterventionView, TransitionError,
};
use crate::remediation::RemediationContent;

pub const DEFAULT_LESSON_TOPIC: &str = "Transformer Architectures";

/// A content fetch the runtime must perform outside the session lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationRequest {
    pub ticket: FetchTicket,
    pub topic: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementStatus {
    pub session_id: String,
    pub topic: String,
    pub capture_active: bool,
    pub counter: u32,
    pub threshold: u32,
    pub emotions: Vec<RankedEmotion>,
    pub warning: Option<String>,
    pub intervention: InterventionView,
}

#[derive(Debug)]
pub struct LearningSession {
    id: String,
    topic: String,
    ingestor: EmotionIngestor,
    detector: DisengagementDetector,
    intervention: InterventionSession,
}

impl LearningSession {
    pub fn new(topic: impl Into<String>, config: DetectorConfig) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            topic: topic.into(),
            ingestor: EmotionIngestor::new(),
            detector: DisengagementDetector::new(config),
            intervention: InterventionSession::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.topic = topic.into();
    }

    pub fn counter(&self) -> u32 {
        self.detector.counter()
    }

    pub fn intervention(&self) -> &InterventionSession {
        &self.intervention
    }

    pub fn capture_active(&self) -> bool {
        self.ingestor.capture_active()
    }

    pub fn on_frame(&mut self, raw: &str) -> FrameOutcome {
        self.ingestor.on_frame(raw)
    }

    pub fn set_capture_active(&mut self, active: bool) {
        if self.ingestor.capture_active() != active {
            info!(
                "Capture {} for session {}",
                if active { "started" } else { "stopped" },
                self.id
            );
        }
        self.ingestor.set_capture_active(active);
    }

    pub fn ranked_snapshot(&self) -> Vec<RankedEmotion> {
        self.ingestor.ranked_snapshot()
    }

    /// One sampling tick against the threshold currently in effect. Opens the
    /// intervention when the detector triggers.
    pub fn tick(&mut self, threshold: u32) -> TickReport {
        let ranked = self.ingestor.ranked_snapshot();
        let report = self.detector.tick(
            &ranked,
            self.ingestor.snapshot_seq(),
            self.intervention.is_open(),
            threshold,
        );

        if report.triggered {
            match self.intervention.apply(InterventionAction::Open) {
                Ok(_) => info!(
                    "Learner disengaged for {}s (threshold {}s); asking to help",
                    report.counter, report.threshold
                ),
                Err(err) => warn!("Detector triggered but intervention did not open: {err}"),
            }
        }
        report
    }

    /// Drives the intervention state machine and applies its counter effect.
    pub fn handle(
        &mut self,
        action: InterventionAction,
    ) -> Result<Option<RemediationRequest>, TransitionError> {
        let transition = self.intervention.apply(action)?;
        if transition.reset_counter {
            self.detector.reset();
        }
        Ok(transition.fetch.map(|ticket| RemediationRequest {
            ticket,
            topic: self.topic.clone(),
        }))
    }

    pub fn deliver(&mut self, epoch: u64, result: Result<RemediationContent, String>) -> bool {
        let applied = self.intervention.deliver(epoch, result);
        if !applied {
            info!("Discarding remediation result for superseded request {epoch}");
        } else if let ContentState::Failed { message } = self.intervention.content() {
            warn!("Remediation content failed to load: {message}");
        }
        applied
    }

    pub fn answer(&mut self, option: usize) -> Result<AnswerOutcome, TransitionError> {
        self.intervention.answer(option)
    }

    pub fn status(&self, threshold: u32) -> EngagementStatus {
        EngagementStatus {
            session_id: self.id.clone(),
            topic: self.topic.clone(),
            capture_active: self.ingestor.capture_active(),
            counter: self.detector.counter(),
            threshold,
            emotions: self.ingestor.ranked_snapshot(),
            warning: self.ingestor.last_warning().map(str::to_string),
            intervention: self.intervention.view(),
        }
    }
}

impl Default for LearningSession {
    fn default() -> Self {
        Self::new(DEFAULT_LESSON_TOPIC, DetectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intervention::InterventionPhase;
    use crate::remediation::RemediationKind;

    const BORED: &str = r#"{"face": {"predictions": [{"emotions": [
        {"name": "Boredom", "score": 0.66}, {"name": "Calmness", "score": 0.2}]}]}}"#;
    const FOCUSED: &str = r#"{"face": {"predictions": [{"emotions": [
        {"name": "Concentration", "score": 0.7}, {"name": "Boredom", "score": 0.1}]}]}}"#;

    fn live_session() -> LearningSession {
        let mut session = LearningSession::default();
        session.set_capture_active(true);
        session
    }

    fn bored_tick(session: &mut LearningSession, threshold: u32) -> TickReport {
        session.on_frame(BORED);
        session.tick(threshold)
    }

    #[test]
    fn five_disengaged_ticks_open_the_intervention() {
        let mut session = live_session();
        for _ in 0..4 {
            assert!(!bored_tick(&mut session, 5).triggered);
            assert_eq!(session.intervention().phase(), InterventionPhase::Closed);
        }
        let report = bored_tick(&mut session, 5);
        assert!(report.triggered);
        assert_eq!(report.counter, 5);
        assert_eq!(session.intervention().phase(), InterventionPhase::AwaitingConsent);
    }

    #[test]
    fn engaged_tick_pauses_episode() {
        let mut session = live_session();
        for _ in 0..3 {
            bored_tick(&mut session, 5);
        }
        session.on_frame(FOCUSED);
        assert_eq!(session.tick(5).counter, 3);

        assert!(!bored_tick(&mut session, 5).triggered);
        assert!(bored_tick(&mut session, 5).triggered);
    }

    #[test]
    fn counter_frozen_while_open_and_reset_on_decline() {
        let mut session = live_session();
        for _ in 0..5 {
            bored_tick(&mut session, 5);
        }
        for _ in 0..3 {
            assert_eq!(bored_tick(&mut session, 5).counter, 5);
        }

        session.handle(InterventionAction::Accept).unwrap();
        assert_eq!(session.counter(), 5);

        session.handle(InterventionAction::ForceClose).unwrap();
        assert_eq!(session.counter(), 0);
        assert_eq!(bored_tick(&mut session, 5).counter, 1);
    }

    #[test]
    fn decline_resets_counter() {
        let mut session = live_session();
        for _ in 0..5 {
            bored_tick(&mut session, 5);
        }
        session.handle(InterventionAction::Decline).unwrap();
        assert_eq!(session.counter(), 0);
        assert!(!session.intervention().is_open());
    }

    #[test]
    fn malformed_quiz_keeps_session_and_counter() {
        let mut session = live_session();
        for _ in 0..5 {
            bored_tick(&mut session, 5);
        }
        session.handle(InterventionAction::Accept).unwrap();
        let request = session
            .handle(InterventionAction::Choose(RemediationKind::Quiz))
            .unwrap()
            .unwrap();
        assert_eq!(request.topic, DEFAULT_LESSON_TOPIC);

        assert!(session.deliver(request.ticket.epoch, Err("not JSON".into())));
        assert_eq!(
            session.intervention().phase(),
            InterventionPhase::InRemediation(RemediationKind::Quiz)
        );
        assert_eq!(session.counter(), 5);

        session.handle(InterventionAction::Dissatisfied).unwrap();
        assert_eq!(
            session.intervention().phase(),
            InterventionPhase::ChoosingRemediation
        );
        assert_eq!(session.counter(), 5);
    }

    #[test]
    fn lowered_threshold_applies_on_next_disengaged_tick() {
        let mut session = live_session();
        for _ in 0..3 {
            bored_tick(&mut session, 5);
        }

        session.on_frame(FOCUSED);
        assert!(!session.tick(2).triggered);
        assert!(!session.intervention().is_open());

        let report = bored_tick(&mut session, 2);
        assert!(report.triggered);
        assert_eq!(report.counter, 4);
        assert!(session.intervention().is_open());
    }

    #[test]
    fn stopped_capture_never_counts() {
        let mut session = live_session();
        session.set_capture_active(false);
        for _ in 0..10 {
            assert_eq!(bored_tick(&mut session, 5).counter, 0);
        }
    }

    #[test]
    fn status_reflects_session() {
        let mut session = live_session();
        session.set_topic("Attention Mechanisms");
        bored_tick(&mut session, 5);

        let status = session.status(5);
        assert_eq!(status.topic, "Attention Mechanisms");
        assert_eq!(status.counter, 1);
        assert_eq!(status.emotions[0].emotion, "Boredom");
        assert_eq!(status.intervention.phase, InterventionPhase::Closed);
    }
}
