use serde::{Deserialize, Serialize};

use super::resource::{Resource, ResourceKind};

pub const ROOT_CRUMB_NAME: &str = "Root";

/// Local projection of a listed resource inside the materialized tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub resource: Resource,
    pub parent_id: Option<String>,
    pub is_expanded: bool,
}

impl TreeNode {
    pub fn id(&self) -> &str {
        &self.resource.resource_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub id: Option<String>,
    pub name: String,
}

impl Breadcrumb {
    pub fn root() -> Self {
        Self {
            id: None,
            name: ROOT_CRUMB_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Name,
    Modified,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindFilter {
    #[default]
    All,
    Files,
    Directories,
}

impl KindFilter {
    pub fn accepts(self, kind: ResourceKind) -> bool {
        match self {
            Self::All => true,
            Self::Files => kind == ResourceKind::File,
            Self::Directories => kind == ResourceKind::Directory,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewOptions {
    pub sort_key: SortKey,
    pub direction: SortDirection,
    pub kind_filter: KindFilter,
    pub search: Option<String>,
}

impl ViewOptions {
    pub fn sorted_by(sort_key: SortKey, direction: SortDirection) -> Self {
        Self {
            sort_key,
            direction,
            ..Self::default()
        }
    }
}

/// One row of the rendered tree, in pre-order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisibleRow {
    pub node: TreeNode,
    pub depth: usize,
}

/// Folder-level listing failure, reported next to whatever tree is already loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingError {
    pub folder_id: Option<String>,
    pub message: String,
}
