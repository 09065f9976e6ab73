use tracing::{info, warn};

use crate::state_file::StateFile;

/// What the process should do after a handled interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// Continue shutting down; the signal is never swallowed.
    Propagate,
}

/// Cleans up session artifacts when the process is interrupted.
#[derive(Debug)]
pub struct SignalHandler {
    state_file: StateFile,
}

impl SignalHandler {
    /// Creates a handler that clears `state_file` on interrupt.
    #[must_use]
    pub fn new(state_file: StateFile) -> Self {
        Self { state_file }
    }

    /// Handles an interrupt by clearing the persisted session state.
    ///
    /// Cleanup failures are logged, never raised; shutdown proceeds either
    /// way.
    pub fn on_interrupt(&self) -> SignalOutcome {
        info!("interrupt received, clearing persisted session state");
        if let Err(error) = self.state_file.clear() {
            warn!(%error, "failed to clear persisted session state");
        }
        SignalOutcome::Propagate
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::state_file::SessionState;

    fn unique_temp_path(file_name: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("gymlink-{file_name}-{suffix}.xml"))
    }

    #[test]
    fn interrupt_clears_the_persisted_session_state() {
        let path = unique_temp_path("signal-clear");
        let state_file = StateFile::new(path.clone());
        state_file
            .save(&SessionState::now(12.5, 3.0))
            .expect("snapshot should save");
        let handler = SignalHandler::new(state_file);

        let outcome = handler.on_interrupt();

        assert_eq!(SignalOutcome::Propagate, outcome);
        assert!(!path.exists());
    }

    #[test]
    fn interrupt_succeeds_without_a_persisted_state() {
        let path = unique_temp_path("signal-missing");
        let handler = SignalHandler::new(StateFile::new(path));

        assert_eq!(SignalOutcome::Propagate, handler.on_interrupt());
    }
}
