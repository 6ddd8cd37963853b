use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InodePath {
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataloaderMetadata {
    #[serde(default)]
    pub content_mime: Option<String>,
    #[serde(default)]
    pub last_modified_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}

/// Immutable snapshot of a remote file or directory as returned by a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub resource_id: String,
    #[serde(rename = "inode_type")]
    pub kind: ResourceKind,
    pub inode_path: InodePath,
    #[serde(default)]
    pub knowledge_base_id: Option<String>,
    #[serde(default)]
    pub dataloader_metadata: Option<DataloaderMetadata>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified_time: Option<String>,
    #[serde(default, skip_serializing)]
    pub modified_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl Resource {
    pub fn new(resource_id: &str, kind: ResourceKind, path: &str) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            kind,
            inode_path: InodePath {
                path: path.to_string(),
            },
            knowledge_base_id: None,
            dataloader_metadata: None,
            size: None,
            modified_time: None,
            modified_at: None,
            created_at: None,
            mime_type: None,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == ResourceKind::Directory
    }

    pub fn path(&self) -> &str {
        &self.inode_path.path
    }

    /// Last path segment, ignoring a trailing separator.
    pub fn name(&self) -> &str {
        let trimmed = self.inode_path.path.trim_end_matches('/');
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    /// Some listings report `modified_at` instead of `modified_time`.
    pub fn normalize(mut self) -> Self {
        if self.modified_time.is_none() {
            self.modified_time = self.modified_at.take();
        }
        self
    }

    /// Timestamp used for chronological ordering, falling back to creation time.
    pub fn modified_millis(&self) -> Option<i64> {
        self.modified_time
            .as_deref()
            .or(self.created_at.as_deref())
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
            .map(|t| t.timestamp_millis())
    }

    pub fn content_mime(&self) -> Option<&str> {
        self.dataloader_metadata
            .as_ref()
            .and_then(|m| m.content_mime.as_deref())
            .or(self.mime_type.as_deref())
    }
}
