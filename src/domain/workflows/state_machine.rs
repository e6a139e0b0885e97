/// Per-job runner states. Measured runs cycle through the middle four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunnerState {
    Idle,
    Preparing,
    Navigating,
    Capturing,
    Detecting,
    Collecting,
    Uploading,
    Done,
    Failed,
}

impl RunnerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerState::Idle => "idle",
            RunnerState::Preparing => "preparing",
            RunnerState::Navigating => "navigating",
            RunnerState::Capturing => "capturing",
            RunnerState::Detecting => "detecting",
            RunnerState::Collecting => "collecting",
            RunnerState::Uploading => "uploading",
            RunnerState::Done => "done",
            RunnerState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunnerState::Done | RunnerState::Failed)
    }

    fn is_in_run(&self) -> bool {
        matches!(
            self,
            RunnerState::Navigating
                | RunnerState::Capturing
                | RunnerState::Detecting
                | RunnerState::Collecting
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    Forbidden { from: RunnerState, to: RunnerState },
}

pub struct RunnerStateMachine;

impl RunnerStateMachine {
    pub fn can_transition(from: RunnerState, to: RunnerState) -> bool {
        use RunnerState::*;

        if from.is_terminal() {
            return false;
        }

        // A failed step ends its run early, so any in-run state may start the
        // next run (with or without re-preparing) or move on to upload.
        if from.is_in_run() && matches!(to, Preparing | Navigating | Uploading) {
            return true;
        }

        matches!(
            (from, to),
            (Idle, Preparing)
                | (Idle, Uploading)
                | (Preparing, Navigating)
                | (Preparing, Uploading)
                | (Navigating, Capturing)
                | (Capturing, Detecting)
                | (Detecting, Collecting)
                | (Uploading, Done)
                | (Uploading, Failed)
        )
    }

    pub fn transition(from: RunnerState, to: RunnerState) -> Result<RunnerState, TransitionError> {
        if Self::can_transition(from, to) {
            return Ok(to);
        }

        Err(TransitionError::Forbidden { from, to })
    }
}
