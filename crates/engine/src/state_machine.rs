use crate::error::{EngineError, Result};

/// Lifecycle of one phase within one execution.
///
/// Synchronous runs go through `Polling` before finalizing; detached runs
/// stay in `Submitted` until a later wait (or collection) finalizes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    NotRun,
    Submitted,
    Polling,
    Finalized { success: bool },
}

impl PhaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRun => "not_run",
            Self::Submitted => "submitted",
            Self::Polling => "polling",
            Self::Finalized { success: true } => "finalized_success",
            Self::Finalized { success: false } => "finalized_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized { .. })
    }
}

pub struct PhaseStateMachine;

impl PhaseStateMachine {
    pub fn validate_transition(from: &PhaseState, to: &PhaseState) -> Result<()> {
        if Self::allowed(from, to) {
            Ok(())
        } else {
            Err(EngineError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    pub fn can_transition(from: &PhaseState, to: &PhaseState) -> bool {
        Self::validate_transition(from, to).is_ok()
    }

    fn allowed(from: &PhaseState, to: &PhaseState) -> bool {
        matches!(
            (from, to),
            (PhaseState::NotRun, PhaseState::Submitted)
                | (PhaseState::Submitted, PhaseState::Polling)
                | (PhaseState::Submitted, PhaseState::Finalized { .. })
                | (PhaseState::Polling, PhaseState::Finalized { .. })
        )
    }
}
