//! Lazily materialized projection of a connection's remote resource graph.
//!
//! Nodes live in a flat id-keyed map with a parent-indexed child list kept
//! alongside it. The child lists double as the backing sequence: a pre-order
//! walk over them in insertion order yields the same ordering the picker
//! would see if nodes were held in one flat list with children spliced in
//! right after their parent.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::models::resource::Resource;
use crate::models::tree::{
    Breadcrumb, ListingError, SortDirection, SortKey, TreeNode, ViewOptions, VisibleRow,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Expanded,
    /// Ids of every descendant dropped by the collapse.
    Collapsed { removed: Vec<String> },
}

#[derive(Debug)]
pub struct ResourceTreeStore {
    nodes: HashMap<String, TreeNode>,
    children: HashMap<Option<String>, Vec<String>>,
    breadcrumbs: Vec<Breadcrumb>,
    current_folder_id: Option<String>,
    current_connection_id: Option<String>,
    error: Option<ListingError>,
}

impl Default for ResourceTreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTreeStore {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            children: HashMap::new(),
            breadcrumbs: vec![Breadcrumb::root()],
            current_folder_id: None,
            current_connection_id: None,
            error: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, resource_id: &str) -> bool {
        self.nodes.contains_key(resource_id)
    }

    pub fn node(&self, resource_id: &str) -> Option<&TreeNode> {
        self.nodes.get(resource_id)
    }

    pub fn path_of(&self, resource_id: &str) -> Option<&str> {
        self.nodes.get(resource_id).map(|n| n.resource.path())
    }

    pub fn breadcrumbs(&self) -> &[Breadcrumb] {
        &self.breadcrumbs
    }

    pub fn current_folder_id(&self) -> Option<&str> {
        self.current_folder_id.as_deref()
    }

    pub fn current_connection_id(&self) -> Option<&str> {
        self.current_connection_id.as_deref()
    }

    pub fn error(&self) -> Option<&ListingError> {
        self.error.as_ref()
    }

    pub fn set_error(&mut self, folder_id: Option<&str>, message: impl Into<String>) {
        self.error = Some(ListingError {
            folder_id: folder_id.map(str::to_string),
            message: message.into(),
        });
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn has_known_children(&self, folder_id: &str) -> bool {
        !self.child_ids(Some(folder_id)).is_empty()
    }

    /// Every materialized node in backing order, hidden ones included.
    pub fn nodes(&self) -> Vec<&TreeNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<&String> = self.child_ids(None).iter().rev().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(id) {
                out.push(node);
                stack.extend(self.child_ids(Some(id)).iter().rev());
            }
        }
        out
    }

    /// Replaces the active folder's direct listing.
    ///
    /// Roots missing from `resources` are dropped with their subtrees. Roots
    /// that are listed again keep whatever children were already materialized
    /// under them, but come back collapsed.
    pub fn set_resources(&mut self, resources: Vec<Resource>) {
        let mut listed = HashSet::new();
        let resources: Vec<Resource> = resources
            .into_iter()
            .filter(|r| listed.insert(r.resource_id.clone()))
            .collect();

        let stale_roots: Vec<String> = self
            .child_ids(None)
            .iter()
            .filter(|id| !listed.contains(*id))
            .cloned()
            .collect();
        for id in stale_roots {
            self.remove_subtree(&id);
            self.remove_node(&id);
        }

        let mut roots = Vec::with_capacity(resources.len());
        for resource in resources {
            let id = resource.resource_id.clone();
            if let Some(previous_parent) = self.nodes.get(&id).map(|n| n.parent_id.clone()) {
                if previous_parent.is_some() {
                    self.detach(&previous_parent, &id);
                }
            }
            self.nodes.insert(
                id.clone(),
                TreeNode {
                    resource,
                    parent_id: None,
                    is_expanded: false,
                },
            );
            roots.push(id);
        }
        self.children.insert(None, roots);
        self.error = None;
    }

    /// Moves to `folder_id`, rewriting the breadcrumb trail and dropping the
    /// previous folder's listing until the new one arrives.
    pub fn navigate_to_folder(&mut self, folder_id: Option<&str>, name: &str) {
        match folder_id {
            None => self.breadcrumbs = vec![Breadcrumb::root()],
            Some(id) => {
                match self
                    .breadcrumbs
                    .iter()
                    .position(|c| c.id.as_deref() == Some(id))
                {
                    Some(index) => self.breadcrumbs.truncate(index + 1),
                    None => self.breadcrumbs.push(Breadcrumb {
                        id: Some(id.to_string()),
                        name: name.to_string(),
                    }),
                }
            }
        }
        self.current_folder_id = folder_id.map(str::to_string);
        self.clear_nodes();
        self.error = None;
        debug!(folder_id = ?self.current_folder_id, depth = self.breadcrumbs.len(), "navigated");
    }

    /// Reinstates a persisted navigation position without touching nodes.
    pub fn restore_navigation(&mut self, folder_id: Option<String>, breadcrumbs: Vec<Breadcrumb>) {
        let trail_is_valid = breadcrumbs.first().is_some_and(|c| c.id.is_none())
            && breadcrumbs.last().map(|c| c.id.as_deref()) == Some(folder_id.as_deref());
        if trail_is_valid {
            self.breadcrumbs = breadcrumbs;
            self.current_folder_id = folder_id;
        } else {
            self.breadcrumbs = vec![Breadcrumb::root()];
            self.current_folder_id = None;
        }
    }

    /// Flips `is_expanded`. Collapsing forgets every descendant; expanding
    /// never fetches.
    pub fn toggle_folder_expanded(&mut self, folder_id: &str) -> Option<ToggleOutcome> {
        let node = self.nodes.get_mut(folder_id)?;
        if !node.resource.is_directory() {
            return None;
        }
        node.is_expanded = !node.is_expanded;
        if node.is_expanded {
            return Some(ToggleOutcome::Expanded);
        }
        let removed = self.remove_subtree(folder_id);
        debug!(folder_id, removed = removed.len(), "collapsed folder");
        Some(ToggleOutcome::Collapsed { removed })
    }

    /// Merges `children` under `folder_id` without changing its expansion.
    ///
    /// Returns the number of nodes inserted, or `None` when the folder is not
    /// a materialized directory. Ids already present anywhere in the tree are
    /// skipped.
    pub fn add_children_to_folder(
        &mut self,
        folder_id: &str,
        children: Vec<Resource>,
    ) -> Option<usize> {
        if !self.nodes.get(folder_id)?.resource.is_directory() {
            return None;
        }

        let mut fresh = Vec::new();
        for child in children {
            if child.resource_id == folder_id || self.nodes.contains_key(&child.resource_id) {
                continue;
            }
            let id = child.resource_id.clone();
            self.nodes.insert(
                id.clone(),
                TreeNode {
                    resource: child,
                    parent_id: Some(folder_id.to_string()),
                    is_expanded: false,
                },
            );
            fresh.push(id);
        }

        let inserted = fresh.len();
        if inserted > 0 {
            let siblings = self.children.entry(Some(folder_id.to_string())).or_default();
            fresh.append(siblings);
            *siblings = fresh;
        }
        Some(inserted)
    }

    /// Same merge as [`add_children_to_folder`](Self::add_children_to_folder),
    /// then marks the folder expanded.
    pub fn add_children_and_expand(
        &mut self,
        folder_id: &str,
        children: Vec<Resource>,
    ) -> Option<usize> {
        let inserted = self.add_children_to_folder(folder_id, children)?;
        if let Some(node) = self.nodes.get_mut(folder_id) {
            node.is_expanded = true;
        }
        Some(inserted)
    }

    pub fn set_knowledge_base(&mut self, resource_id: &str, knowledge_base_id: Option<&str>) {
        if let Some(node) = self.nodes.get_mut(resource_id) {
            node.resource.knowledge_base_id = knowledge_base_id.map(str::to_string);
        }
    }

    /// Switches connection context, resetting everything when it changes.
    pub fn set_connection(&mut self, connection_id: Option<&str>) -> bool {
        if self.current_connection_id.as_deref() == connection_id {
            return false;
        }
        self.reset();
        self.current_connection_id = connection_id.map(str::to_string);
        true
    }

    pub fn reset(&mut self) {
        self.clear_nodes();
        self.breadcrumbs = vec![Breadcrumb::root()];
        self.current_folder_id = None;
        self.error = None;
    }

    /// Pre-order walk of the rendered tree: siblings sorted per `options`,
    /// descending only into expanded directories. Filters hide a node together
    /// with everything beneath it.
    pub fn visible_rows(&self, options: &ViewOptions) -> Vec<VisibleRow> {
        let search = options
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let mut out = Vec::new();
        self.walk_visible(None, 0, options, search.as_deref(), &mut out);
        out
    }

    fn walk_visible(
        &self,
        parent: Option<&str>,
        depth: usize,
        options: &ViewOptions,
        search: Option<&str>,
        out: &mut Vec<VisibleRow>,
    ) {
        let mut siblings: Vec<&TreeNode> = self
            .child_ids(parent)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|n| options.kind_filter.accepts(n.resource.kind))
            .filter(|n| {
                search.map_or(true, |term| n.resource.path().to_lowercase().contains(term))
            })
            .collect();
        siblings.sort_by(|a, b| compare_siblings(a, b, options));

        for node in siblings {
            out.push(VisibleRow {
                node: node.clone(),
                depth,
            });
            if node.resource.is_directory() && node.is_expanded {
                self.walk_visible(Some(node.id()), depth + 1, options, search, out);
            }
        }
    }

    fn child_ids(&self, parent: Option<&str>) -> &[String] {
        let key = parent.map(str::to_string);
        self.children.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Drops every descendant of `folder_id` (not the folder itself).
    fn remove_subtree(&mut self, folder_id: &str) -> Vec<String> {
        let mut removed = Vec::new();
        let mut stack = self
            .children
            .remove(&Some(folder_id.to_string()))
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            if let Some(grandchildren) = self.children.remove(&Some(id.clone())) {
                stack.extend(grandchildren);
            }
            self.nodes.remove(&id);
            removed.push(id);
        }
        removed
    }

    fn remove_node(&mut self, resource_id: &str) {
        if let Some(node) = self.nodes.remove(resource_id) {
            self.detach(&node.parent_id, resource_id);
        }
    }

    fn detach(&mut self, parent: &Option<String>, resource_id: &str) {
        if let Some(siblings) = self.children.get_mut(parent) {
            siblings.retain(|id| id != resource_id);
            if siblings.is_empty() && parent.is_some() {
                self.children.remove(parent);
            }
        }
    }

    fn clear_nodes(&mut self) {
        self.nodes.clear();
        self.children.clear();
    }
}

fn compare_siblings(a: &TreeNode, b: &TreeNode, options: &ViewOptions) -> Ordering {
    let primary = match options.sort_key {
        SortKey::Name => a.resource.name().cmp(b.resource.name()),
        SortKey::Modified => a
            .resource
            .modified_millis()
            .cmp(&b.resource.modified_millis()),
    };
    let primary = match options.direction {
        SortDirection::Asc => primary,
        SortDirection::Desc => primary.reverse(),
    };
    primary.then_with(|| a.id().cmp(b.id()))
}
