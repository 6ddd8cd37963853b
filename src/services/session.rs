//! One picker session: the tree, the indexing queue, their workers and the
//! gateway calls that feed them.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::data::repository::{self, NavigationRecord};
use crate::error::AppError;
use crate::models::indexing::{EnqueueOutcome, IndexingStatus, QueueEvent, QueueKind, QueueSnapshot};
use crate::models::tree::{Breadcrumb, ListingError, ViewOptions, VisibleRow};
use crate::services::gateway::ResourceGateway;
use crate::services::prefetch::{self, Prefetch};
use crate::services::queue_worker::spawn_queue_worker;
use crate::services::tree_store::ToggleOutcome;
use crate::state::SessionState;

pub struct PickerSession<G: ResourceGateway> {
    state: Arc<SessionState<G>>,
    index_wake: mpsc::UnboundedSender<()>,
    remove_wake: mpsc::UnboundedSender<()>,
    workers: Vec<JoinHandle<()>>,
}

fn no_connection() -> AppError {
    AppError::General("No connection selected".to_string())
}

impl<G: ResourceGateway> PickerSession<G> {
    /// Builds the session and spawns one worker per queue. Must be called
    /// inside a tokio runtime.
    pub fn start(gateway: G, db: rusqlite::Connection, config: &AppConfig) -> Self {
        let state = Arc::new(SessionState::new(gateway, db, config));
        let (index_wake, index_rx) = mpsc::unbounded_channel();
        let (remove_wake, remove_rx) = mpsc::unbounded_channel();
        let workers = vec![
            spawn_queue_worker(Arc::clone(&state), QueueKind::Index, index_rx),
            spawn_queue_worker(Arc::clone(&state), QueueKind::Remove, remove_rx),
        ];
        Self {
            state,
            index_wake,
            remove_wake,
            workers,
        }
    }

    pub fn state(&self) -> &Arc<SessionState<G>> {
        &self.state
    }

    /// Selects a connection and loads its last visited folder. Switching to a
    /// different connection drops the tree, the queues and every cache.
    pub async fn open_connection(&self, connection_id: &str) -> Result<usize, AppError> {
        let changed = self.state.tree().set_connection(Some(connection_id));
        if changed {
            self.state.queue().clear_indexing_state();
            self.state.clear_targets();
            self.state.clear_prefetched();
            self.state.clear_expansions();
            self.state.listings.clear();

            let saved = repository::load_navigation(&self.state.db(), connection_id);
            match saved {
                Ok(Some(record)) => self
                    .state
                    .tree()
                    .restore_navigation(record.current_folder_id, record.breadcrumbs),
                Ok(None) => {}
                Err(err) => warn!(connection_id, error = %err, "failed to load navigation"),
            }
            info!(connection_id, "opened connection");
        }
        self.load_current_folder().await
    }

    /// Lists the active folder into the tree. A failure sets the folder-level
    /// error flag and leaves the tree as it was.
    pub async fn load_current_folder(&self) -> Result<usize, AppError> {
        let (connection_id, folder_id) = {
            let tree = self.state.tree();
            let connection_id = tree
                .current_connection_id()
                .ok_or_else(no_connection)?
                .to_string();
            let folder_id = tree.current_folder_id().map(str::to_string);
            (connection_id, folder_id)
        };
        let folder = folder_id.as_deref();
        let listing = self
            .state
            .listings
            .get_or_fetch(&connection_id, folder, || {
                self.state.gateway.list_children(&connection_id, folder)
            })
            .await;

        let mut tree = self.state.tree();
        if tree.current_connection_id() != Some(connection_id.as_str())
            || tree.current_folder_id() != folder
        {
            debug!(folder_id = ?folder, "discarding listing for a folder no longer active");
            return Ok(0);
        }
        match listing {
            Ok(resources) => {
                let count = resources.len();
                tree.set_resources(resources.as_ref().clone());
                Ok(count)
            }
            Err(err) if err.is_not_found() => {
                tree.set_resources(Vec::new());
                Ok(0)
            }
            Err(err) => {
                warn!(folder_id = ?folder, error = %err, "folder listing failed");
                tree.set_error(folder, err.to_string());
                Err(err)
            }
        }
    }

    /// Relists the active folder, bypassing the dedupe window.
    pub async fn refresh_current_folder(&self) -> Result<usize, AppError> {
        let key = {
            let tree = self.state.tree();
            let key = tree.current_connection_id().map(|connection_id| {
                (
                    connection_id.to_string(),
                    tree.current_folder_id().map(str::to_string),
                )
            });
            key
        };
        if let Some((connection_id, folder_id)) = key {
            self.state
                .listings
                .invalidate(&connection_id, folder_id.as_deref());
        }
        self.load_current_folder().await
    }

    /// Moves to a folder (`None` is the root), remembers the position and
    /// lists it.
    pub async fn navigate_to_folder(
        &self,
        folder_id: Option<&str>,
        name: &str,
    ) -> Result<usize, AppError> {
        let record = {
            let mut tree = self.state.tree();
            tree.navigate_to_folder(folder_id, name);
            let record = tree.current_connection_id().map(|connection_id| NavigationRecord {
                connection_id: connection_id.to_string(),
                current_folder_id: tree.current_folder_id().map(str::to_string),
                breadcrumbs: tree.breadcrumbs().to_vec(),
            });
            record
        };
        self.state.clear_prefetched();
        self.state.clear_expansions();
        if let Some(record) = record {
            if let Err(err) = repository::save_navigation(&self.state.db(), &record) {
                warn!(connection_id = %record.connection_id, error = %err, "failed to save navigation");
            }
        }
        self.load_current_folder().await
    }

    /// Expands or collapses a folder. Expanding a folder whose children are
    /// not known yet lists them first; collapsing forgets the subtree.
    ///
    /// A toggle that arrives while an expansion is still waiting on its
    /// listing withdraws that expansion. The listing then lands collapsed and
    /// the waiting call returns `None`.
    pub async fn toggle_folder(&self, folder_id: &str) -> Result<Option<ToggleOutcome>, AppError> {
        let connection_id = {
            let mut tree = self.state.tree();
            let Some(node) = tree.node(folder_id) else {
                return Ok(None);
            };
            if !node.resource.is_directory() {
                return Ok(None);
            }
            if node.is_expanded || tree.has_known_children(folder_id) {
                let outcome = tree.toggle_folder_expanded(folder_id);
                drop(tree);
                self.state.cancel_expansion(folder_id);
                if let Some(ToggleOutcome::Collapsed { removed }) = &outcome {
                    self.state.unmark_prefetched(
                        std::iter::once(folder_id).chain(removed.iter().map(String::as_str)),
                    );
                }
                return Ok(outcome);
            }
            let connection_id = tree
                .current_connection_id()
                .ok_or_else(no_connection)?
                .to_string();
            if !self.state.begin_expansion(folder_id) {
                self.state.cancel_expansion(folder_id);
                debug!(folder_id, "expansion withdrawn before its listing arrived");
                return Ok(Some(ToggleOutcome::Collapsed {
                    removed: Vec::new(),
                }));
            }
            connection_id
        };

        let listing = self
            .state
            .listings
            .get_or_fetch(&connection_id, Some(folder_id), || {
                self.state.gateway.list_children(&connection_id, Some(folder_id))
            })
            .await;
        let children = match listing {
            Ok(children) => children.as_ref().clone(),
            Err(err) if err.is_not_found() => Vec::new(),
            Err(err) => {
                self.state.cancel_expansion(folder_id);
                warn!(folder_id, error = %err, "folder expansion failed");
                self.state.tree().set_error(Some(folder_id), err.to_string());
                return Err(err);
            }
        };

        let mut tree = self.state.tree();
        let still_wanted = self.state.cancel_expansion(folder_id);
        if tree.current_connection_id() != Some(connection_id.as_str()) {
            return Ok(None);
        }
        if !still_wanted {
            tree.add_children_to_folder(folder_id, children);
            return Ok(None);
        }
        Ok(tree
            .add_children_and_expand(folder_id, children)
            .map(|_| ToggleOutcome::Expanded))
    }

    pub async fn prefetch_folder(&self, folder_id: &str) -> Prefetch {
        prefetch::prefetch_folder(&self.state, folder_id).await
    }

    pub async fn prefetch_top_level(&self) -> usize {
        prefetch::prefetch_top_level(&self.state).await
    }

    /// Fire-and-forget prefetch for a folder that just became visible.
    pub fn spawn_prefetch(&self, folder_id: &str) -> JoinHandle<Prefetch> {
        let state = Arc::clone(&self.state);
        let folder_id = folder_id.to_string();
        tokio::spawn(async move { prefetch::prefetch_folder(&state, &folder_id).await })
    }

    pub fn queue_indexing(&self, resource_id: &str) -> EnqueueOutcome {
        self.enqueue(QueueKind::Index, resource_id)
    }

    pub fn queue_removing(&self, resource_id: &str) -> EnqueueOutcome {
        self.enqueue(QueueKind::Remove, resource_id)
    }

    fn enqueue(&self, kind: QueueKind, resource_id: &str) -> EnqueueOutcome {
        let resource = self
            .state
            .tree()
            .node(resource_id)
            .map(|node| node.resource.clone());
        let outcome = {
            let mut queue = self.state.queue();
            let outcome = match kind {
                QueueKind::Index => queue.queue_indexing(resource_id),
                QueueKind::Remove => queue.queue_removing(resource_id),
            };
            if let (EnqueueOutcome::Queued, Some(resource)) = (outcome, resource) {
                self.state.remember_target(resource);
            }
            outcome
        };

        match outcome {
            EnqueueOutcome::Queued => {
                self.state.emit(resource_id, kind, IndexingStatus::Queued);
                let wake = match kind {
                    QueueKind::Index => &self.index_wake,
                    QueueKind::Remove => &self.remove_wake,
                };
                if wake.send(()).is_err() {
                    warn!(resource_id, queue = %kind, "queue worker is gone");
                }
            }
            EnqueueOutcome::AlreadyQueued | EnqueueOutcome::Conflict => {}
        }
        outcome
    }

    /// Drops a job that has not started yet.
    pub fn cancel_pending(&self, resource_id: &str) -> Result<bool, AppError> {
        let (kind, status) = {
            let mut queue = self.state.queue();
            let Some(kind) = queue.queued_in(resource_id) else {
                return Ok(false);
            };
            if !queue.cancel_pending(resource_id)? {
                return Ok(false);
            }
            self.state.forget_target(resource_id);
            (kind, queue.status(resource_id))
        };
        self.state.emit(resource_id, kind, status);
        Ok(true)
    }

    /// Reloads index membership for the active knowledge base.
    pub async fn refresh_indexed(&self) -> Result<usize, AppError> {
        let Some(knowledge_base_id) = self.state.queue().knowledge_base_id().map(str::to_string)
        else {
            return Ok(0);
        };
        let members = match self
            .state
            .gateway
            .list_indexed_resources(&knowledge_base_id)
            .await
        {
            Ok(members) => members,
            Err(err) if err.is_not_found() => Vec::new(),
            Err(err) => return Err(err),
        };
        let ids: Vec<String> = members.into_iter().map(|r| r.resource_id).collect();

        {
            let mut queue = self.state.queue();
            if queue.knowledge_base_id() != Some(knowledge_base_id.as_str()) {
                return Ok(0);
            }
            queue.set_indexed_resources(ids.iter().cloned());
        }
        let mut tree = self.state.tree();
        for id in &ids {
            tree.set_knowledge_base(id, Some(&knowledge_base_id));
        }
        Ok(ids.len())
    }

    /// Asks the gateway about materialized resources that are neither indexed
    /// nor queued. Probe failures are logged and skipped.
    pub async fn probe_unindexed(&self, limit: usize) -> usize {
        let candidates: Vec<String> = {
            let tree = self.state.tree();
            let queue = self.state.queue();
            let candidates = tree
                .nodes()
                .into_iter()
                .map(|node| node.id())
                .filter(|id| !queue.is_resource_indexed(id) && !queue.is_pending(id))
                .take(limit)
                .map(str::to_string)
                .collect();
            candidates
        };

        let mut found = 0;
        for resource_id in candidates {
            match self.state.gateway.probe_indexed(&resource_id).await {
                Ok(true) => {
                    let added = {
                        let mut queue = self.state.queue();
                        let fresh =
                            !queue.is_pending(&resource_id) && !queue.is_resource_indexed(&resource_id);
                        if fresh {
                            queue.add_indexed_resource(&resource_id);
                        }
                        fresh
                    };
                    if added {
                        self.state.emit(&resource_id, QueueKind::Index, IndexingStatus::Done);
                        found += 1;
                    }
                }
                Ok(false) => {}
                Err(err) => debug!(resource_id = %resource_id, error = %err, "index probe failed"),
            }
        }
        found
    }

    pub fn set_org_id(&self, org_id: Option<&str>) {
        self.state.set_org_id(org_id);
    }

    pub fn set_knowledge_base_id(&self, knowledge_base_id: Option<&str>) {
        self.state.queue().set_knowledge_base_id(knowledge_base_id);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.state.subscribe()
    }

    pub fn visible_rows(&self, options: &ViewOptions) -> Vec<VisibleRow> {
        self.state.tree().visible_rows(options)
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.state.tree().breadcrumbs().to_vec()
    }

    pub fn listing_error(&self) -> Option<ListingError> {
        self.state.tree().error().cloned()
    }

    pub fn status(&self, resource_id: &str) -> IndexingStatus {
        self.state.queue().status(resource_id)
    }

    pub fn queue_snapshot(&self) -> QueueSnapshot {
        self.state.queue().snapshot()
    }

    /// Stops both workers after they finish the job in hand.
    pub async fn shutdown(self) {
        let Self {
            index_wake,
            remove_wake,
            workers,
            ..
        } = self;
        drop(index_wake);
        drop(remove_wake);
        for worker in workers {
            if let Err(err) = worker.await {
                warn!(error = %err, "queue worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::tree::SortKey;
    use crate::services::test_support::{dir, file, test_config, FakeGateway, TEST_KB};

    fn open_db() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        crate::data::migrations::run_migrations(&conn).unwrap();
        conn
    }

    fn drive() -> FakeGateway {
        let gateway = FakeGateway::default();
        gateway.set_children(None, vec![dir("f1", "/F1"), dir("f2", "/F2"), file("x", "/x.txt")]);
        gateway.set_children(Some("f1"), vec![file("g1", "/F1/g1.txt")]);
        gateway
    }

    fn start(gateway: FakeGateway) -> PickerSession<FakeGateway> {
        PickerSession::start(gateway, open_db(), &test_config())
    }

    fn visible_ids(session: &PickerSession<FakeGateway>) -> Vec<String> {
        session
            .visible_rows(&ViewOptions::default())
            .into_iter()
            .map(|row| row.node.resource.resource_id)
            .collect()
    }

    async fn wait_for(
        events: &mut broadcast::Receiver<QueueEvent>,
        resource_id: &str,
        status: IndexingStatus,
    ) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let event = events.recv().await.unwrap();
                if event.resource_id == resource_id && event.status == status {
                    return;
                }
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn open_connection_lists_top_level() {
        let session = start(drive());
        assert_eq!(session.open_connection("conn-1").await.unwrap(), 3);
        assert_eq!(visible_ids(&session), vec!["f1", "f2", "x"]);
        assert_eq!(session.breadcrumbs(), vec![Breadcrumb::root()]);
    }

    #[tokio::test]
    async fn expand_fetches_once_and_collapse_forgets() {
        let session = start(drive());
        session.open_connection("conn-1").await.unwrap();

        let outcome = session.toggle_folder("f1").await.unwrap();
        assert_eq!(outcome, Some(ToggleOutcome::Expanded));
        assert_eq!(visible_ids(&session), vec!["f1", "g1", "f2", "x"]);

        let outcome = session.toggle_folder("f1").await.unwrap();
        assert_eq!(
            outcome,
            Some(ToggleOutcome::Collapsed {
                removed: vec!["g1".to_string()]
            })
        );
        assert_eq!(visible_ids(&session), vec!["f1", "f2", "x"]);

        // Served from the dedupe window.
        session.toggle_folder("f1").await.unwrap();
        assert_eq!(visible_ids(&session), vec!["f1", "g1", "f2", "x"]);
        assert_eq!(session.state().gateway.listed(Some("f1")), 1);
    }

    #[tokio::test]
    async fn expand_uses_prefetched_children() {
        let session = start(drive());
        session.open_connection("conn-1").await.unwrap();
        assert_eq!(session.prefetch_folder("f1").await, Prefetch::Merged(1));
        assert_eq!(visible_ids(&session), vec!["f1", "f2", "x"]);

        session.toggle_folder("f1").await.unwrap();
        assert_eq!(visible_ids(&session), vec!["f1", "g1", "f2", "x"]);
        assert_eq!(session.state().gateway.listed(Some("f1")), 1);
    }

    #[tokio::test]
    async fn collapse_clears_prefetch_marks() {
        let session = start(drive());
        session.open_connection("conn-1").await.unwrap();
        session.prefetch_folder("f1").await;
        session.toggle_folder("f1").await.unwrap();
        session.toggle_folder("f1").await.unwrap();
        assert!(!session.state().is_prefetched("f1"));
    }

    #[tokio::test]
    async fn second_toggle_during_fetch_withdraws_the_expansion() {
        let gateway = FakeGateway::with_latency(Duration::from_millis(50));
        gateway.set_children(None, vec![dir("f1", "/F1"), dir("f2", "/F2"), file("x", "/x.txt")]);
        gateway.set_children(Some("f1"), vec![file("g1", "/F1/g1.txt")]);
        let session = start(gateway);
        session.open_connection("conn-1").await.unwrap();

        let (first, second) = tokio::join!(session.toggle_folder("f1"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            session.toggle_folder("f1").await
        });
        assert_eq!(first.unwrap(), None);
        assert_eq!(
            second.unwrap(),
            Some(ToggleOutcome::Collapsed {
                removed: Vec::new()
            })
        );
        assert!(!session.state().tree().node("f1").unwrap().is_expanded);
        assert_eq!(visible_ids(&session), vec!["f1", "f2", "x"]);

        // The landed listing is reused by the next expansion.
        let third = session.toggle_folder("f1").await.unwrap();
        assert_eq!(third, Some(ToggleOutcome::Expanded));
        assert_eq!(visible_ids(&session), vec!["f1", "g1", "f2", "x"]);
        assert_eq!(session.state().gateway.listed(Some("f1")), 1);
    }

    #[tokio::test]
    async fn late_listing_does_not_reopen_a_collapsed_folder() {
        let gateway = FakeGateway::with_latency(Duration::from_millis(50));
        gateway.set_children(None, vec![dir("f1", "/F1"), file("x", "/x.txt")]);
        gateway.set_children(Some("f1"), vec![file("g1", "/F1/g1.txt")]);
        let session = start(gateway);
        session.open_connection("conn-1").await.unwrap();

        let (first, (expanded, collapsed)) = tokio::join!(session.toggle_folder("f1"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            session
                .state()
                .tree()
                .add_children_to_folder("f1", vec![file("g1", "/F1/g1.txt")]);
            let expanded = session.toggle_folder("f1").await.unwrap();
            let collapsed = session.toggle_folder("f1").await.unwrap();
            (expanded, collapsed)
        });
        assert_eq!(expanded, Some(ToggleOutcome::Expanded));
        assert!(matches!(collapsed, Some(ToggleOutcome::Collapsed { .. })));
        assert_eq!(first.unwrap(), None);
        assert!(!session.state().tree().node("f1").unwrap().is_expanded);
        assert_eq!(visible_ids(&session), vec!["f1", "x"]);
    }

    #[tokio::test]
    async fn listing_failure_sets_error_and_keeps_tree() {
        let session = start(drive());
        session.open_connection("conn-1").await.unwrap();
        session.state().gateway.fail_listing(Some("f2"));

        let err = session.toggle_folder("f2").await.unwrap_err();
        assert!(matches!(err, AppError::Network(_)));
        assert_eq!(visible_ids(&session), vec!["f1", "f2", "x"]);
        assert_eq!(
            session.listing_error().unwrap().folder_id.as_deref(),
            Some("f2")
        );
    }

    #[tokio::test]
    async fn refresh_bypasses_the_dedupe_window() {
        let session = start(drive());
        session.open_connection("conn-1").await.unwrap();
        session.load_current_folder().await.unwrap();
        assert_eq!(session.state().gateway.listed(None), 1);

        session
            .state()
            .gateway
            .set_children(None, vec![file("y", "/y.txt")]);
        assert_eq!(session.refresh_current_folder().await.unwrap(), 1);
        assert_eq!(session.state().gateway.listed(None), 2);
        assert_eq!(visible_ids(&session), vec!["y"]);
    }

    #[tokio::test]
    async fn navigation_is_restored_per_connection() {
        let gateway = drive();
        gateway.set_children(Some("f2"), vec![file("h1", "/F2/h1.txt")]);
        let session = start(gateway);
        session.open_connection("conn-1").await.unwrap();
        session.navigate_to_folder(Some("f2"), "F2").await.unwrap();
        assert_eq!(visible_ids(&session), vec!["h1"]);

        session.open_connection("conn-2").await.unwrap();
        assert_eq!(session.breadcrumbs(), vec![Breadcrumb::root()]);

        session.open_connection("conn-1").await.unwrap();
        assert_eq!(session.breadcrumbs().last().unwrap().id.as_deref(), Some("f2"));
        assert_eq!(visible_ids(&session), vec!["h1"]);

        session.navigate_to_folder(None, "Root").await.unwrap();
        assert_eq!(session.breadcrumbs(), vec![Breadcrumb::root()]);
        assert_eq!(visible_ids(&session), vec!["f1", "f2", "x"]);
    }

    #[tokio::test]
    async fn queued_jobs_run_in_the_background() {
        let session = start(drive());
        session.open_connection("conn-1").await.unwrap();
        let mut events = session.subscribe();

        assert_eq!(session.queue_indexing("x"), EnqueueOutcome::Queued);
        assert_eq!(session.queue_removing("x"), EnqueueOutcome::Conflict);
        wait_for(&mut events, "x", IndexingStatus::Done).await;

        let snapshot = session.queue_snapshot();
        assert_eq!(snapshot.knowledge_base_id.as_deref(), Some(TEST_KB));
        assert_eq!(snapshot.indexed_resource_ids, vec!["x"]);
        assert!(snapshot.index_queue.is_empty());

        assert_eq!(session.queue_removing("x"), EnqueueOutcome::Queued);
        wait_for(&mut events, "x", IndexingStatus::Idle).await;
        assert!(session.queue_snapshot().indexed_resource_ids.is_empty());
        session.shutdown().await;
    }

    #[tokio::test]
    async fn cancel_drops_a_waiting_job() {
        let session = start(FakeGateway::with_latency(Duration::from_millis(50)));
        session.state().tree().set_connection(Some("conn-1"));
        session
            .state()
            .tree()
            .set_resources(vec![file("a", "/a.txt"), file("b", "/b.txt")]);
        let mut events = session.subscribe();

        session.queue_indexing("a");
        session.queue_indexing("b");
        wait_for(&mut events, "a", IndexingStatus::Indexing).await;

        assert!(matches!(
            session.cancel_pending("a"),
            Err(AppError::QueueConflict(_))
        ));
        assert!(session.cancel_pending("b").unwrap());
        assert_eq!(session.status("b"), IndexingStatus::Idle);

        wait_for(&mut events, "a", IndexingStatus::Done).await;
        assert_eq!(session.state().gateway.indexed_order(), vec!["a"]);
    }

    #[tokio::test]
    async fn refresh_loads_membership_and_annotates_tree() {
        let gateway = drive();
        gateway.set_kb_members(vec![file("x", "/x.txt")]);
        let session = start(gateway);
        session.open_connection("conn-1").await.unwrap();
        assert_eq!(session.refresh_indexed().await.unwrap(), 0);

        session.set_knowledge_base_id(Some(TEST_KB));
        assert_eq!(session.refresh_indexed().await.unwrap(), 1);
        assert_eq!(session.status("x"), IndexingStatus::Done);
        let tree = session.state().tree();
        assert_eq!(
            tree.node("x").unwrap().resource.knowledge_base_id.as_deref(),
            Some(TEST_KB)
        );
    }

    #[tokio::test]
    async fn probe_marks_resources_found_in_the_index() {
        let gateway = drive();
        gateway.answer_probe("f1", false);
        gateway.answer_probe("x", true);
        let session = start(gateway);
        session.open_connection("conn-1").await.unwrap();

        assert_eq!(session.probe_unindexed(10).await, 1);
        assert_eq!(session.status("x"), IndexingStatus::Done);
        // f2 has no scripted answer and fails quietly.
        assert_eq!(session.state().gateway.probe_calls.lock().unwrap().len(), 3);

        assert_eq!(session.probe_unindexed(10).await, 0);
        assert_eq!(session.state().gateway.probe_calls.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn sorted_view_orders_siblings() {
        let session = start(drive());
        session.open_connection("conn-1").await.unwrap();
        let rows = session.visible_rows(&ViewOptions::sorted_by(
            SortKey::Name,
            crate::models::tree::SortDirection::Desc,
        ));
        let ids: Vec<&str> = rows.iter().map(|r| r.node.id()).collect();
        assert_eq!(ids, vec!["x", "f2", "f1"]);
    }
}
