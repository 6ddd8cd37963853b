//! Speculative listing of folders the user is likely to open next.

use tracing::{debug, warn};

use crate::services::gateway::ResourceGateway;
use crate::state::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefetch {
    /// Not a collapsed directory in the current tree, or already prefetched.
    Skipped,
    Merged(usize),
    /// The tree moved on while the listing was in flight.
    Stale,
    Failed,
}

/// Lists a collapsed folder's children and merges them without expanding it.
/// Failures are logged and leave the folder eligible for another attempt.
pub async fn prefetch_folder<G: ResourceGateway>(
    state: &SessionState<G>,
    folder_id: &str,
) -> Prefetch {
    let connection_id = {
        let tree = state.tree();
        let eligible = tree
            .node(folder_id)
            .is_some_and(|node| node.resource.is_directory() && !node.is_expanded);
        let connection_id = match tree.current_connection_id() {
            Some(connection_id) if eligible => connection_id.to_string(),
            _ => return Prefetch::Skipped,
        };
        connection_id
    };
    if !state.mark_prefetched(folder_id) {
        return Prefetch::Skipped;
    }

    let listing = state
        .listings
        .get_or_fetch(&connection_id, Some(folder_id), || {
            state.gateway.list_children(&connection_id, Some(folder_id))
        })
        .await;
    let children = match listing {
        Ok(children) => children,
        Err(err) if err.is_not_found() => Default::default(),
        Err(err) => {
            state.unmark_prefetched([folder_id]);
            warn!(folder_id, connection_id = %connection_id, error = %err, "prefetch failed");
            return Prefetch::Failed;
        }
    };

    let merged = {
        let mut tree = state.tree();
        if tree.current_connection_id() == Some(connection_id.as_str()) {
            tree.add_children_to_folder(folder_id, children.as_ref().clone())
        } else {
            None
        }
    };
    match merged {
        Some(inserted) => {
            debug!(folder_id, inserted, "prefetched folder");
            Prefetch::Merged(inserted)
        }
        None => {
            state.unmark_prefetched([folder_id]);
            Prefetch::Stale
        }
    }
}

/// Prefetches every collapsed top-level directory. Returns how many merged.
pub async fn prefetch_top_level<G: ResourceGateway>(state: &SessionState<G>) -> usize {
    let folder_ids: Vec<String> = state
        .tree()
        .nodes()
        .into_iter()
        .filter(|node| node.parent_id.is_none() && node.resource.is_directory())
        .map(|node| node.id().to_string())
        .collect();

    let mut merged = 0;
    for folder_id in folder_ids {
        if let Prefetch::Merged(_) = prefetch_folder(state, &folder_id).await {
            merged += 1;
        }
    }
    merged
}
