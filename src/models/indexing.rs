use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingStatus {
    #[default]
    Idle,
    Queued,
    Indexing,
    Removing,
    Done,
    Error,
}

impl std::fmt::Display for IndexingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Queued => write!(f, "queued"),
            Self::Indexing => write!(f, "indexing"),
            Self::Removing => write!(f, "removing"),
            Self::Done => write!(f, "done"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for IndexingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "queued" => Ok(Self::Queued),
            "indexing" => Ok(Self::Indexing),
            "removing" => Ok(Self::Removing),
            "done" => Ok(Self::Done),
            "error" => Ok(Self::Error),
            _ => Err(format!("unknown indexing status: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    Index,
    Remove,
}

impl QueueKind {
    /// Status a job carries while its remote call is outstanding.
    pub fn active_status(self) -> IndexingStatus {
        match self {
            Self::Index => IndexingStatus::Indexing,
            Self::Remove => IndexingStatus::Removing,
        }
    }
}

impl std::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index => write!(f, "index"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// Result of asking a queue to accept a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueOutcome {
    Queued,
    AlreadyQueued,
    Conflict,
}

/// Handle for a job that has been moved to its active status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveJob {
    pub resource_id: String,
    pub queue: QueueKind,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEvent {
    pub resource_id: String,
    pub queue: QueueKind,
    pub status: IndexingStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub index_queue: Vec<String>,
    pub remove_queue: Vec<String>,
    pub knowledge_base_id: Option<String>,
    pub indexed_resource_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            IndexingStatus::Idle,
            IndexingStatus::Queued,
            IndexingStatus::Indexing,
            IndexingStatus::Removing,
            IndexingStatus::Done,
            IndexingStatus::Error,
        ] {
            assert_eq!(status.to_string().parse::<IndexingStatus>(), Ok(status));
        }
        assert!("paused".parse::<IndexingStatus>().is_err());
    }
}
