pub mod state;

pub use state::{
    AnswerOutcome, ContentState, FetchTicket, InterventionAction, InterventionPhase,
    InterventionSession, InterventionView, RemediationProgress, Transition, TransitionError,
};
