//! Stage agent trait.

use async_trait::async_trait;
use docflow_core::{DocumentState, StageError, StageKind};

/// One pipeline stage.
///
/// # Containment
/// A stage never raises past itself. [`run`](StageAgent::run) records any
/// [`StageError`] from [`execute`](StageAgent::execute) in the state and
/// hands the state on; the graph then ends the run as halted.
#[async_trait]
pub trait StageAgent: Send + Sync {
    fn stage(&self) -> StageKind;

    /// Do the stage's work on `state`.
    ///
    /// On error the state may be left as it was; `run` records the failure.
    async fn execute(&self, state: &mut DocumentState) -> Result<(), StageError>;

    /// Execute and contain failures.
    async fn run(&self, mut state: DocumentState) -> DocumentState {
        if let Err(e) = self.execute(&mut state).await {
            tracing::warn!(stage = %self.stage(), error = %e, "Stage failed");
            state.record_failure(self.stage(), &e);
        }
        state
    }
}
