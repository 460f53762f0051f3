//! Stage agents.
//!
//! One agent per pipeline stage. Classification and extraction ask the
//! completion service; validation and routing wrap the deterministic
//! policies from `docflow-core`.

mod classify;
mod deterministic;
mod extract;
mod traits;

pub use classify::ClassifyAgent;
pub use deterministic::{RouteAgent, ValidateAgent};
pub use extract::ExtractAgent;
pub use traits::StageAgent;
