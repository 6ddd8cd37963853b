//! Per-resource indexing lifecycle and the two FIFO job queues.
//!
//! The queue only tracks state. Remote calls are made by the queue worker,
//! which activates a head with [`IndexingQueue::activate_next`] and reports
//! back through [`IndexingQueue::settle`].

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use crate::error::AppError;
use crate::models::indexing::{
    ActiveJob, EnqueueOutcome, IndexingStatus, QueueKind, QueueSnapshot,
};

#[derive(Debug, Default)]
pub struct IndexingQueue {
    knowledge_base_id: Option<String>,
    indexed: HashSet<String>,
    statuses: HashMap<String, IndexingStatus>,
    index_queue: VecDeque<String>,
    remove_queue: VecDeque<String>,
    active_index: Option<String>,
    active_remove: Option<String>,
    // Bumped on every reset so that jobs activated before it settle as no-ops.
    generation: u64,
}

impl IndexingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn knowledge_base_id(&self) -> Option<&str> {
        self.knowledge_base_id.as_deref()
    }

    pub fn set_knowledge_base_id(&mut self, knowledge_base_id: Option<&str>) {
        self.knowledge_base_id = knowledge_base_id.map(str::to_string);
    }

    pub fn is_resource_indexed(&self, resource_id: &str) -> bool {
        self.indexed.contains(resource_id)
    }

    pub fn indexed_ids(&self) -> impl Iterator<Item = &str> {
        self.indexed.iter().map(String::as_str)
    }

    /// Records membership. A resource with a pending or running job keeps
    /// its job status.
    pub fn add_indexed_resource(&mut self, resource_id: &str) {
        self.indexed.insert(resource_id.to_string());
        if !self.is_pending(resource_id) {
            self.statuses
                .insert(resource_id.to_string(), IndexingStatus::Done);
        }
    }

    pub fn remove_indexed_resource(&mut self, resource_id: &str) {
        self.indexed.remove(resource_id);
        if !self.is_pending(resource_id) {
            self.statuses.remove(resource_id);
        }
    }

    /// Replaces the indexed set with a fresh membership listing. Resources
    /// with a pending or running job keep their job status.
    pub fn set_indexed_resources<I, S>(&mut self, resource_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fresh: HashSet<String> = resource_ids.into_iter().map(Into::into).collect();
        for dropped in self.indexed.difference(&fresh) {
            if self.statuses.get(dropped) == Some(&IndexingStatus::Done) {
                self.statuses.remove(dropped);
            }
        }
        for id in &fresh {
            if !self.is_pending(id) {
                self.statuses.insert(id.clone(), IndexingStatus::Done);
            }
        }
        self.indexed = fresh;
    }

    pub fn clear_indexing_state(&mut self) {
        *self = Self {
            generation: self.generation + 1,
            ..Self::default()
        };
    }

    pub fn status(&self, resource_id: &str) -> IndexingStatus {
        self.statuses
            .get(resource_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn queue(&self, kind: QueueKind) -> &VecDeque<String> {
        match kind {
            QueueKind::Index => &self.index_queue,
            QueueKind::Remove => &self.remove_queue,
        }
    }

    pub fn active(&self, kind: QueueKind) -> Option<&str> {
        match kind {
            QueueKind::Index => self.active_index.as_deref(),
            QueueKind::Remove => self.active_remove.as_deref(),
        }
    }

    pub fn queued_in(&self, resource_id: &str) -> Option<QueueKind> {
        [QueueKind::Index, QueueKind::Remove]
            .into_iter()
            .find(|kind| self.queue(*kind).iter().any(|id| id == resource_id))
    }

    pub fn is_pending(&self, resource_id: &str) -> bool {
        self.queued_in(resource_id).is_some()
    }

    pub fn queue_indexing(&mut self, resource_id: &str) -> EnqueueOutcome {
        self.enqueue(QueueKind::Index, resource_id)
    }

    pub fn queue_removing(&mut self, resource_id: &str) -> EnqueueOutcome {
        self.enqueue(QueueKind::Remove, resource_id)
    }

    fn enqueue(&mut self, kind: QueueKind, resource_id: &str) -> EnqueueOutcome {
        match self.queued_in(resource_id) {
            Some(existing) if existing == kind => return EnqueueOutcome::AlreadyQueued,
            Some(existing) => {
                warn!(resource_id, queue = %kind, pending_in = %existing, "rejected conflicting queue request");
                return EnqueueOutcome::Conflict;
            }
            None => {}
        }
        self.queue_mut(kind).push_back(resource_id.to_string());
        self.statuses
            .insert(resource_id.to_string(), IndexingStatus::Queued);
        debug!(resource_id, queue = %kind, "queued");
        EnqueueOutcome::Queued
    }

    /// Withdraws a job that has not been activated yet, restoring the status
    /// implied by index membership. Returns `false` when nothing was queued.
    pub fn cancel_pending(&mut self, resource_id: &str) -> Result<bool, AppError> {
        let Some(kind) = self.queued_in(resource_id) else {
            return Ok(false);
        };
        if self.active(kind) == Some(resource_id) {
            return Err(AppError::QueueConflict(format!(
                "{resource_id} is already {}",
                kind.active_status()
            )));
        }
        self.queue_mut(kind).retain(|id| id != resource_id);
        if self.indexed.contains(resource_id) {
            self.statuses
                .insert(resource_id.to_string(), IndexingStatus::Done);
        } else {
            self.statuses.remove(resource_id);
        }
        Ok(true)
    }

    /// Moves the head of `kind` to its active status. Returns `None` when the
    /// queue is empty or its single slot is already taken.
    pub fn activate_next(&mut self, kind: QueueKind) -> Option<ActiveJob> {
        if self.active(kind).is_some() {
            return None;
        }
        let head = self.queue(kind).front()?.clone();
        if self.status(&head) != IndexingStatus::Queued {
            return None;
        }
        self.statuses.insert(head.clone(), kind.active_status());
        *self.active_mut(kind) = Some(head.clone());
        Some(ActiveJob {
            resource_id: head,
            queue: kind,
            generation: self.generation,
        })
    }

    /// Records the outcome of an activated job and pops it, unblocking the
    /// next head. Returns the resulting status, or `None` if the job predates
    /// a reset.
    pub fn settle(&mut self, job: &ActiveJob, succeeded: bool) -> Option<IndexingStatus> {
        if job.generation != self.generation
            || self.active(job.queue) != Some(job.resource_id.as_str())
        {
            debug!(resource_id = %job.resource_id, "dropping stale job outcome");
            return None;
        }

        let id = job.resource_id.as_str();
        let status = match (job.queue, succeeded) {
            (QueueKind::Index, true) => {
                self.indexed.insert(id.to_string());
                IndexingStatus::Done
            }
            (QueueKind::Remove, true) => {
                self.indexed.remove(id);
                IndexingStatus::Idle
            }
            (_, false) => IndexingStatus::Error,
        };
        if status == IndexingStatus::Idle {
            self.statuses.remove(id);
        } else {
            self.statuses.insert(id.to_string(), status);
        }

        let queue = self.queue_mut(job.queue);
        if queue.front().map(String::as_str) == Some(id) {
            queue.pop_front();
        } else {
            queue.retain(|queued| queued != id);
        }
        *self.active_mut(job.queue) = None;
        Some(status)
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let mut indexed: Vec<String> = self.indexed.iter().cloned().collect();
        indexed.sort();
        QueueSnapshot {
            index_queue: self.index_queue.iter().cloned().collect(),
            remove_queue: self.remove_queue.iter().cloned().collect(),
            knowledge_base_id: self.knowledge_base_id.clone(),
            indexed_resource_ids: indexed,
        }
    }

    fn queue_mut(&mut self, kind: QueueKind) -> &mut VecDeque<String> {
        match kind {
            QueueKind::Index => &mut self.index_queue,
            QueueKind::Remove => &mut self.remove_queue,
        }
    }

    fn active_mut(&mut self, kind: QueueKind) -> &mut Option<String> {
        match kind {
            QueueKind::Index => &mut self.active_index,
            QueueKind::Remove => &mut self.active_remove,
        }
    }
}
