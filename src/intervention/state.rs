use serde::Serialize;
use thiserror::Error;

use crate::remediation::{RemediationContent, RemediationKind};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "phase", content = "kind", rename_all = "camelCase")]
pub enum InterventionPhase {
    #[default]
    Closed,
    AwaitingConsent,
    ChoosingRemediation,
    InRemediation(RemediationKind),
}

impl InterventionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionPhase::Closed => "closed",
            InterventionPhase::AwaitingConsent => "awaiting consent",
            InterventionPhase::ChoosingRemediation => "choosing remediation",
            InterventionPhase::InRemediation(_) => "in remediation",
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, InterventionPhase::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterventionAction {
    /// Detector reached the threshold.
    Open,
    /// "No, I'm good to continue"
    Decline,
    /// "Yes, I need help"
    Accept,
    Choose(RemediationKind),
    /// Re-request content for the current remediation.
    Retry,
    /// Thumbs up, or closing a finished quiz/poll.
    Satisfied,
    /// Thumbs down: pick another remediation for the same episode.
    Dissatisfied,
    ForceClose,
}

impl InterventionAction {
    fn as_str(&self) -> &'static str {
        match self {
            InterventionAction::Open => "open",
            InterventionAction::Decline => "decline",
            InterventionAction::Accept => "accept",
            InterventionAction::Choose(_) => "choose",
            InterventionAction::Retry => "retry",
            InterventionAction::Satisfied => "finish",
            InterventionAction::Dissatisfied => "go back",
            InterventionAction::ForceClose => "close",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {action} an intervention that is {phase}")]
    Invalid {
        action: &'static str,
        phase: &'static str,
    },
    #[error("remediation content is not loaded")]
    ContentNotReady,
    #[error("this remediation has no questions to answer")]
    NotAnswerable,
    #[error("all questions are already answered")]
    AlreadyCompleted,
    #[error("option {index} is out of range ({available} options)")]
    OptionOutOfRange { index: usize, available: usize },
}

/// Fetch the controller must issue; results are matched back by `epoch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub kind: RemediationKind,
    pub epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub reset_counter: bool,
    pub fetch: Option<FetchTicket>,
}

impl Transition {
    fn keep() -> Self {
        Self {
            reset_counter: false,
            fetch: None,
        }
    }

    fn reset() -> Self {
        Self {
            reset_counter: true,
            fetch: None,
        }
    }

    fn fetch(ticket: FetchTicket) -> Self {
        Self {
            reset_counter: false,
            fetch: Some(ticket),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ContentState {
    #[default]
    Idle,
    Loading,
    Ready { content: RemediationContent },
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RemediationProgress {
    pub current_question: usize,
    pub answers: Vec<usize>,
    pub score: u32,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    /// `None` for polls and for quiz questions without a usable answer key.
    pub correct: Option<bool>,
    pub completed: bool,
    pub score: u32,
}

/// Serializable picture of the session for the UI.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InterventionView {
    pub phase: InterventionPhase,
    pub remediation_kind: Option<RemediationKind>,
    pub content: ContentState,
    pub progress: RemediationProgress,
}

/// The intervention state machine. Every mutation goes through [`apply`],
/// [`deliver`] or [`answer`].
///
/// [`apply`]: InterventionSession::apply
/// [`deliver`]: InterventionSession::deliver
/// [`answer`]: InterventionSession::answer
#[derive(Debug, Default)]
pub struct InterventionSession {
    phase: InterventionPhase,
    remediation_kind: Option<RemediationKind>,
    epoch: u64,
    content: ContentState,
    progress: RemediationProgress,
}

impl InterventionSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> InterventionPhase {
        self.phase
    }

    pub fn is_open(&self) -> bool {
        self.phase.is_open()
    }

    pub fn remediation_kind(&self) -> Option<RemediationKind> {
        self.remediation_kind
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn content(&self) -> &ContentState {
        &self.content
    }

    pub fn progress(&self) -> &RemediationProgress {
        &self.progress
    }

    pub fn view(&self) -> InterventionView {
        InterventionView {
            phase: self.phase,
            remediation_kind: self.remediation_kind,
            content: self.content.clone(),
            progress: self.progress.clone(),
        }
    }

    pub fn apply(&mut self, action: InterventionAction) -> Result<Transition, TransitionError> {
        use InterventionAction as A;
        use InterventionPhase as P;

        match (self.phase, action) {
            (P::Closed, A::Open) => {
                self.phase = P::AwaitingConsent;
                self.remediation_kind = None;
                self.clear_content();
                Ok(Transition::keep())
            }
            (P::AwaitingConsent, A::Decline) => {
                self.close();
                Ok(Transition::reset())
            }
            (P::AwaitingConsent, A::Accept) => {
                self.phase = P::ChoosingRemediation;
                Ok(Transition::keep())
            }
            (P::ChoosingRemediation, A::Choose(kind)) => {
                self.phase = P::InRemediation(kind);
                self.remediation_kind = Some(kind);
                Ok(Transition::fetch(self.begin_fetch(kind)))
            }
            (P::InRemediation(kind), A::Retry) => Ok(Transition::fetch(self.begin_fetch(kind))),
            (P::InRemediation(_), A::Satisfied) => {
                self.close();
                Ok(Transition::reset())
            }
            (P::InRemediation(_), A::Dissatisfied) => {
                self.phase = P::ChoosingRemediation;
                self.remediation_kind = None;
                self.invalidate_fetches();
                Ok(Transition::keep())
            }
            (_, A::ForceClose) => {
                self.close();
                Ok(Transition::reset())
            }
            (phase, action) => Err(TransitionError::Invalid {
                action: action.as_str(),
                phase: phase.as_str(),
            }),
        }
    }

    /// Applies a finished fetch. Returns `false` when the result belongs to a
    /// request the session has already moved past.
    pub fn deliver(&mut self, epoch: u64, result: Result<RemediationContent, String>) -> bool {
        let InterventionPhase::InRemediation(kind) = self.phase else {
            return false;
        };
        if epoch != self.epoch || self.content != ContentState::Loading {
            return false;
        }

        self.content = match result {
            Ok(content) if content.kind() == kind => ContentState::Ready { content },
            Ok(content) => ContentState::Failed {
                message: format!(
                    "expected {} content but received {}",
                    kind.as_str(),
                    content.kind().as_str()
                ),
            },
            Err(message) => ContentState::Failed { message },
        };
        true
    }

    /// Records an answer for the current poll or quiz question.
    pub fn answer(&mut self, option: usize) -> Result<AnswerOutcome, TransitionError> {
        if !matches!(self.phase, InterventionPhase::InRemediation(_)) {
            return Err(TransitionError::Invalid {
                action: "answer",
                phase: self.phase.as_str(),
            });
        }
        let ContentState::Ready { content } = &self.content else {
            return Err(TransitionError::ContentNotReady);
        };
        if self.progress.completed {
            return Err(TransitionError::AlreadyCompleted);
        }

        let index = self.progress.current_question;
        let (available, correct) = match content {
            RemediationContent::UseCase { .. } => return Err(TransitionError::NotAnswerable),
            RemediationContent::Poll { questions } => {
                let question = questions.get(index).ok_or(TransitionError::AlreadyCompleted)?;
                (question.options.len(), None)
            }
            RemediationContent::Quiz { questions } => {
                let question = questions.get(index).ok_or(TransitionError::AlreadyCompleted)?;
                let correct = question.correct_answer.map(|expected| expected == option);
                (question.options.len(), correct)
            }
        };
        if option >= available {
            return Err(TransitionError::OptionOutOfRange {
                index: option,
                available,
            });
        }

        let total = content.question_count();
        self.progress.answers.push(option);
        if correct == Some(true) {
            self.progress.score += 1;
        }
        self.progress.current_question += 1;
        self.progress.completed = self.progress.current_question >= total;

        Ok(AnswerOutcome {
            correct,
            completed: self.progress.completed,
            score: self.progress.score,
        })
    }

    fn begin_fetch(&mut self, kind: RemediationKind) -> FetchTicket {
        self.epoch = self.epoch.wrapping_add(1);
        self.content = ContentState::Loading;
        self.progress = RemediationProgress::default();
        FetchTicket {
            kind,
            epoch: self.epoch,
        }
    }

    fn invalidate_fetches(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.clear_content();
    }

    fn clear_content(&mut self) {
        self.content = ContentState::Idle;
        self.progress = RemediationProgress::default();
    }

    fn close(&mut self) {
        self.phase = InterventionPhase::Closed;
        self.remediation_kind = None;
        self.invalidate_fetches();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remediation::{PollQuestion, QuizQuestion};

    fn quiz() -> RemediationContent {
        RemediationContent::Quiz {
            questions: vec![
                QuizQuestion {
                    question: "What does self-attention compare?".into(),
                    options: vec!["Tokens with tokens".into(), "Pixels".into()],
                    correct_answer: Some(0),
                },
                QuizQuestion {
                    question: "Which block follows attention?".into(),
                    options: vec!["Pooling".into(), "Feed-forward".into()],
                    correct_answer: Some(1),
                },
            ],
        }
    }

    fn in_remediation(kind: RemediationKind) -> (InterventionSession, FetchTicket) {
        let mut session = InterventionSession::new();
        session.apply(InterventionAction::Open).unwrap();
        session.apply(InterventionAction::Accept).unwrap();
        let ticket = session
            .apply(InterventionAction::Choose(kind))
            .unwrap()
            .fetch
            .unwrap();
        (session, ticket)
    }

    #[test]
    fn happy_path_through_quiz() {
        let mut session = InterventionSession::new();
        assert_eq!(
            session.apply(InterventionAction::Open).unwrap(),
            Transition::keep()
        );
        assert_eq!(session.phase(), InterventionPhase::AwaitingConsent);
        assert!(!session.apply(InterventionAction::Accept).unwrap().reset_counter);

        let transition = session
            .apply(InterventionAction::Choose(RemediationKind::Quiz))
            .unwrap();
        let ticket = transition.fetch.unwrap();
        assert_eq!(ticket.kind, RemediationKind::Quiz);
        assert_eq!(*session.content(), ContentState::Loading);

        assert!(session.deliver(ticket.epoch, Ok(quiz())));
        let first = session.answer(0).unwrap();
        assert_eq!(first.correct, Some(true));
        assert!(!first.completed);
        let second = session.answer(0).unwrap();
        assert_eq!(second.correct, Some(false));
        assert!(second.completed);
        assert_eq!(second.score, 1);
        assert_eq!(session.answer(1), Err(TransitionError::AlreadyCompleted));

        let transition = session.apply(InterventionAction::Satisfied).unwrap();
        assert!(transition.reset_counter);
        assert_eq!(session.phase(), InterventionPhase::Closed);
        assert_eq!(session.remediation_kind(), None);
    }

    #[test]
    fn decline_closes_and_resets() {
        let mut session = InterventionSession::new();
        session.apply(InterventionAction::Open).unwrap();
        let transition = session.apply(InterventionAction::Decline).unwrap();
        assert!(transition.reset_counter);
        assert!(!session.is_open());
    }

    #[test]
    fn thumbs_down_returns_to_chooser_without_reset() {
        let (mut session, ticket) = in_remediation(RemediationKind::UseCase);
        session.deliver(
            ticket.epoch,
            Ok(RemediationContent::UseCase {
                points: vec!["Machine translation".into()],
            }),
        );

        let transition = session.apply(InterventionAction::Dissatisfied).unwrap();
        assert!(!transition.reset_counter);
        assert_eq!(session.phase(), InterventionPhase::ChoosingRemediation);
        assert_eq!(*session.content(), ContentState::Idle);

        let next = session
            .apply(InterventionAction::Choose(RemediationKind::Poll))
            .unwrap()
            .fetch
            .unwrap();
        assert!(next.epoch > ticket.epoch);
    }

    #[test]
    fn stale_delivery_is_discarded() {
        let (mut session, ticket) = in_remediation(RemediationKind::Quiz);
        session.apply(InterventionAction::Dissatisfied).unwrap();
        assert!(!session.deliver(ticket.epoch, Ok(quiz())));

        let (mut session, ticket) = in_remediation(RemediationKind::Quiz);
        session.apply(InterventionAction::ForceClose).unwrap();
        assert!(!session.deliver(ticket.epoch, Ok(quiz())));
        assert_eq!(*session.content(), ContentState::Idle);
    }

    #[test]
    fn failed_fetch_keeps_session_and_allows_retry() {
        let (mut session, ticket) = in_remediation(RemediationKind::Quiz);
        assert!(session.deliver(ticket.epoch, Err("model returned prose".into())));
        assert_eq!(session.phase(), InterventionPhase::InRemediation(RemediationKind::Quiz));
        assert!(matches!(session.content(), ContentState::Failed { .. }));

        let retry = session.apply(InterventionAction::Retry).unwrap().fetch.unwrap();
        assert!(retry.epoch > ticket.epoch);
        assert!(session.deliver(retry.epoch, Ok(quiz())));
        assert!(matches!(session.content(), ContentState::Ready { .. }));
    }

    #[test]
    fn mismatched_content_kind_is_a_failure() {
        let (mut session, ticket) = in_remediation(RemediationKind::Poll);
        session.deliver(ticket.epoch, Ok(quiz()));
        assert!(matches!(session.content(), ContentState::Failed { .. }));
    }

    #[test]
    fn invalid_transitions_leave_state_untouched() {
        let mut session = InterventionSession::new();
        assert!(session.apply(InterventionAction::Accept).is_err());
        assert!(session
            .apply(InterventionAction::Choose(RemediationKind::Poll))
            .is_err());
        assert_eq!(session.phase(), InterventionPhase::Closed);

        session.apply(InterventionAction::Open).unwrap();
        let err = session.apply(InterventionAction::Open).unwrap_err();
        assert_eq!(
            err,
            TransitionError::Invalid {
                action: "open",
                phase: "awaiting consent"
            }
        );
        assert!(session.apply(InterventionAction::Satisfied).is_err());
        assert_eq!(session.phase(), InterventionPhase::AwaitingConsent);
    }

    #[test]
    fn force_close_works_from_every_phase() {
        for kind in [None, Some(RemediationKind::Poll)] {
            let mut session = InterventionSession::new();
            session.apply(InterventionAction::Open).unwrap();
            if let Some(kind) = kind {
                session.apply(InterventionAction::Accept).unwrap();
                session.apply(InterventionAction::Choose(kind)).unwrap();
            }
            assert!(session.apply(InterventionAction::ForceClose).unwrap().reset_counter);
            assert_eq!(session.phase(), InterventionPhase::Closed);
            assert_eq!(session.remediation_kind(), None);
        }
    }

    #[test]
    fn poll_answers_validate_option_range() {
        let (mut session, ticket) = in_remediation(RemediationKind::Poll);
        session.deliver(
            ticket.epoch,
            Ok(RemediationContent::Poll {
                questions: vec![PollQuestion {
                    question: "How confident are you?".into(),
                    options: vec!["Very".into(), "Somewhat".into()],
                }],
            }),
        );

        assert_eq!(
            session.answer(5),
            Err(TransitionError::OptionOutOfRange {
                index: 5,
                available: 2
            })
        );
        let outcome = session.answer(1).unwrap();
        assert_eq!(outcome.correct, None);
        assert!(outcome.completed);
    }

    #[test]
    fn answering_before_content_arrives_fails() {
        let (mut session, _) = in_remediation(RemediationKind::Quiz);
        assert_eq!(session.answer(0), Err(TransitionError::ContentNotReady));
    }
}
