//! Runs queued index and remove jobs against the gateway.
//!
//! Each queue gets one worker task. A job is activated under the queue lock,
//! the remote call runs with no lock held, and the outcome is applied only
//! after the call confirms.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::models::indexing::{IndexingStatus, QueueKind};
use crate::models::knowledge_base::{IndexRequest, DEFAULT_INDEX_DESCRIPTION, FALLBACK_CONTENT_MIME};
use crate::models::resource::Resource;
use crate::services::gateway::ResourceGateway;
use crate::state::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRun {
    Settled(IndexingStatus),
    /// The queue was reset while the call was in flight.
    Discarded,
}

/// Activates and runs the head of `kind`. `None` when the queue is empty or
/// its active slot is taken.
pub async fn run_next_job<G: ResourceGateway>(
    state: &SessionState<G>,
    kind: QueueKind,
) -> Option<JobRun> {
    let job = state.queue().activate_next(kind)?;
    let resource_id = job.resource_id.as_str();
    state.emit(resource_id, kind, kind.active_status());
    debug!(resource_id, queue = %kind, "job started");

    let outcome = match kind {
        QueueKind::Index => index_resource(state, resource_id).await.map(Some),
        QueueKind::Remove => remove_resource(state, resource_id).await.map(|()| None),
    };
    if let Err(err) = &outcome {
        warn!(resource_id, queue = %kind, error = %err, "job failed");
    }

    let settled = {
        let mut queue = state.queue();
        let status = queue.settle(&job, outcome.is_ok());
        if status.is_some() {
            if let Ok(Some(knowledge_base_id)) = &outcome {
                queue.set_knowledge_base_id(Some(knowledge_base_id));
            }
            state.forget_target(resource_id);
        }
        status
    };
    let Some(status) = settled else {
        return Some(JobRun::Discarded);
    };

    {
        let mut tree = state.tree();
        match (status, &outcome) {
            (IndexingStatus::Done, Ok(Some(knowledge_base_id))) => {
                tree.set_knowledge_base(resource_id, Some(knowledge_base_id));
            }
            (IndexingStatus::Idle, _) => tree.set_knowledge_base(resource_id, None),
            _ => {}
        }
    }
    state.emit(resource_id, kind, status);
    info!(resource_id, queue = %kind, status = %status, "job settled");
    Some(JobRun::Settled(status))
}

/// Runs jobs until the queue is empty or blocked. Returns how many ran.
pub async fn drain_queue<G: ResourceGateway>(state: &SessionState<G>, kind: QueueKind) -> usize {
    let mut ran = 0;
    while run_next_job(state, kind).await.is_some() {
        ran += 1;
    }
    ran
}

/// Drains `kind` every time the channel is signalled. Stops once every sender
/// is dropped.
pub fn spawn_queue_worker<G: ResourceGateway>(
    state: Arc<SessionState<G>>,
    kind: QueueKind,
    mut wake: mpsc::UnboundedReceiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while wake.recv().await.is_some() {
            let ran = drain_queue(&state, kind).await;
            if ran > 0 {
                debug!(queue = %kind, ran, "queue drained");
            }
        }
        debug!(queue = %kind, "queue worker stopped");
    })
}

fn resolve_target<G>(state: &SessionState<G>, resource_id: &str) -> Result<Resource, AppError> {
    if let Some(resource) = state.target(resource_id) {
        return Ok(resource);
    }
    state
        .tree()
        .node(resource_id)
        .map(|node| node.resource.clone())
        .ok_or_else(|| AppError::NotFound(format!("resource {resource_id}")))
}

async fn index_resource<G: ResourceGateway>(
    state: &SessionState<G>,
    resource_id: &str,
) -> Result<String, AppError> {
    let resource = resolve_target(state, resource_id)?;
    let connection_id = state
        .tree()
        .current_connection_id()
        .map(str::to_string)
        .ok_or_else(|| AppError::General("No connection selected".to_string()))?;
    let org_id = state
        .org_id()
        .ok_or_else(|| AppError::Config("organization id is not set".to_string()))?;

    let request = IndexRequest {
        connection_id,
        resource_ids: vec![resource.resource_id.clone()],
        name: resource.path().to_string(),
        description: DEFAULT_INDEX_DESCRIPTION.to_string(),
        org_id,
        content_mime: Some(
            resource
                .content_mime()
                .unwrap_or(FALLBACK_CONTENT_MIME)
                .to_string(),
        ),
    };
    let created = state.gateway.create_or_extend_index(&request).await?;
    Ok(created.knowledge_base_id)
}

async fn remove_resource<G: ResourceGateway>(
    state: &SessionState<G>,
    resource_id: &str,
) -> Result<(), AppError> {
    let knowledge_base_id = state
        .queue()
        .knowledge_base_id()
        .map(str::to_string)
        .ok_or_else(|| AppError::NotFound("knowledge base".to_string()))?;
    let resource = resolve_target(state, resource_id)?;
    state
        .gateway
        .delete_indexed_resource(&knowledge_base_id, resource.path())
        .await
}
