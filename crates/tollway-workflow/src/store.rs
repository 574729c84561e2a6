//! Workflow persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tollway_core::{Result, TollwayError};
use uuid::Uuid;

use crate::workflow::Workflow;

/// Persistence collaborator for workflows.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Store a new workflow.
    async fn insert(&self, workflow: Workflow) -> Result<()>;

    /// Get a workflow by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Workflow>>;

    /// Replace an existing workflow.
    async fn update(&self, workflow: Workflow) -> Result<()>;

    /// All workflows, oldest first.
    async fn list(&self) -> Result<Vec<Workflow>>;
}

/// In-memory implementation of [`WorkflowStore`].
#[derive(Clone, Default)]
pub struct InMemoryWorkflowStore {
    workflows: Arc<RwLock<HashMap<Uuid, Workflow>>>,
}

impl InMemoryWorkflowStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn insert(&self, workflow: Workflow) -> Result<()> {
        let mut workflows = self.workflows.write().await;
        if workflows.contains_key(&workflow.id) {
            return Err(TollwayError::Internal(format!(
                "Workflow {} already exists",
                workflow.id
            )));
        }
        workflows.insert(workflow.id, workflow);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Workflow>> {
        let workflows = self.workflows.read().await;
        Ok(workflows.get(&id).cloned())
    }

    async fn update(&self, workflow: Workflow) -> Result<()> {
        let mut workflows = self.workflows.write().await;
        match workflows.get_mut(&workflow.id) {
            Some(existing) => {
                *existing = workflow;
                Ok(())
            }
            None => Err(TollwayError::NotFound {
                resource_type: "workflow".to_string(),
                id: workflow.id.to_string(),
            }),
        }
    }

    async fn list(&self) -> Result<Vec<Workflow>> {
        let workflows = self.workflows.read().await;
        let mut all: Vec<Workflow> = workflows.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }
}
