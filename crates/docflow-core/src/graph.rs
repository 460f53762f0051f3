//! The pipeline graph.
//!
//! ```text
//! classify ──► extract ──► validate ──┬──► route ──► done
//!    │                                └──► human_review
//!    └──► human_review
//! ```
//!
//! Any stage that ends with `next_action = error_handling` ends the run in
//! `halted`; there is no edge out of error handling.

use serde::{Deserialize, Serialize};

use crate::stages::StageKind;
use crate::types::{DocumentState, NextAction};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    /// Routing completed.
    Done,
    /// Escalated to a human; handled outside the pipeline.
    HumanReview,
    /// A stage failed; partial state is kept for the caller.
    Halted,
}

/// A position in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Stage(StageKind),
    End(Terminal),
}

/// Entry point of every run.
pub const ENTRY: Node = Node::Stage(StageKind::Classify);

/// Where to go after `stage` has run and left `state` behind.
pub fn next_node(stage: StageKind, state: &DocumentState) -> Node {
    if state.is_halted() {
        return Node::End(Terminal::Halted);
    }

    match stage {
        StageKind::Classify => {
            if state.next_action == Some(NextAction::HumanReview) {
                Node::End(Terminal::HumanReview)
            } else {
                Node::Stage(StageKind::Extract)
            }
        }
        StageKind::Extract => Node::Stage(StageKind::Validate),
        StageKind::Validate => {
            if state.human_review_required {
                Node::End(Terminal::HumanReview)
            } else {
                Node::Stage(StageKind::Route)
            }
        }
        StageKind::Route => Node::End(Terminal::Done),
    }
}
