//! Agents for the stages that never call the model.

use async_trait::async_trait;
use docflow_core::{
    DocumentState, DocumentTypeRegistry, RoutingPolicy, StageError, StageKind, ValidationStage,
};
use std::sync::Arc;

use super::StageAgent;

pub struct ValidateAgent {
    stage: ValidationStage,
}

impl ValidateAgent {
    pub fn new(registry: Arc<DocumentTypeRegistry>) -> Self {
        Self {
            stage: ValidationStage::new(registry),
        }
    }
}

#[async_trait]
impl StageAgent for ValidateAgent {
    fn stage(&self) -> StageKind {
        StageKind::Validate
    }

    async fn execute(&self, state: &mut DocumentState) -> Result<(), StageError> {
        self.stage.apply(state)
    }
}

pub struct RouteAgent {
    policy: RoutingPolicy,
}

impl RouteAgent {
    pub fn new(registry: Arc<DocumentTypeRegistry>) -> Self {
        Self {
            policy: RoutingPolicy::new(registry),
        }
    }
}

#[async_trait]
impl StageAgent for RouteAgent {
    fn stage(&self) -> StageKind {
        StageKind::Route
    }

    async fn execute(&self, state: &mut DocumentState) -> Result<(), StageError> {
        self.policy.apply(state)
    }
}
