//! Scripted in-memory gateway for worker and session tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::knowledge_base::{IndexRequest, KnowledgeBaseRef};
use crate::models::resource::{Resource, ResourceKind};
use crate::services::gateway::ResourceGateway;
use crate::state::SessionState;

pub const TEST_KB: &str = "kb-test";

#[derive(Default)]
pub struct FakeGateway {
    pub latency: Option<Duration>,
    children: Mutex<HashMap<Option<String>, Vec<Resource>>>,
    failing_folders: Mutex<HashSet<Option<String>>>,
    failing_index: Mutex<HashSet<String>>,
    failing_delete: Mutex<HashSet<String>>,
    kb_members: Mutex<Vec<Resource>>,
    probe_answers: Mutex<HashMap<String, bool>>,
    pub list_calls: Mutex<Vec<Option<String>>>,
    pub index_calls: Mutex<Vec<IndexRequest>>,
    pub delete_calls: Mutex<Vec<(String, String)>>,
    pub probe_calls: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn set_children(&self, folder_id: Option<&str>, children: Vec<Resource>) {
        self.children
            .lock()
            .unwrap()
            .insert(folder_id.map(str::to_string), children);
    }

    pub fn fail_listing(&self, folder_id: Option<&str>) {
        self.failing_folders
            .lock()
            .unwrap()
            .insert(folder_id.map(str::to_string));
    }

    pub fn heal_listing(&self, folder_id: Option<&str>) {
        self.failing_folders
            .lock()
            .unwrap()
            .remove(&folder_id.map(str::to_string));
    }

    pub fn fail_index(&self, resource_id: &str) {
        self.failing_index
            .lock()
            .unwrap()
            .insert(resource_id.to_string());
    }

    pub fn fail_delete(&self, resource_path: &str) {
        self.failing_delete
            .lock()
            .unwrap()
            .insert(resource_path.to_string());
    }

    pub fn set_kb_members(&self, members: Vec<Resource>) {
        *self.kb_members.lock().unwrap() = members;
    }

    pub fn answer_probe(&self, resource_id: &str, indexed: bool) {
        self.probe_answers
            .lock()
            .unwrap()
            .insert(resource_id.to_string(), indexed);
    }

    pub fn listed(&self, folder_id: Option<&str>) -> usize {
        let key = folder_id.map(str::to_string);
        self.list_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|f| **f == key)
            .count()
    }

    pub fn indexed_order(&self) -> Vec<String> {
        self.index_calls
            .lock()
            .unwrap()
            .iter()
            .flat_map(|r| r.resource_ids.clone())
            .collect()
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl ResourceGateway for FakeGateway {
    async fn list_children(
        &self,
        _connection_id: &str,
        folder_id: Option<&str>,
    ) -> Result<Vec<Resource>, AppError> {
        let key = folder_id.map(str::to_string);
        self.list_calls.lock().unwrap().push(key.clone());
        self.pause().await;
        if self.failing_folders.lock().unwrap().contains(&key) {
            return Err(AppError::Network("503 Service Unavailable".to_string()));
        }
        Ok(self
            .children
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_indexed_resources(
        &self,
        _knowledge_base_id: &str,
    ) -> Result<Vec<Resource>, AppError> {
        self.pause().await;
        Ok(self.kb_members.lock().unwrap().clone())
    }

    async fn create_or_extend_index(
        &self,
        request: &IndexRequest,
    ) -> Result<KnowledgeBaseRef, AppError> {
        self.index_calls.lock().unwrap().push(request.clone());
        self.pause().await;
        let failing = request
            .resource_ids
            .iter()
            .any(|id| self.failing_index.lock().unwrap().contains(id));
        if failing {
            return Err(AppError::Network("500 Internal Server Error".to_string()));
        }
        Ok(KnowledgeBaseRef {
            knowledge_base_id: TEST_KB.to_string(),
        })
    }

    async fn delete_indexed_resource(
        &self,
        knowledge_base_id: &str,
        resource_path: &str,
    ) -> Result<(), AppError> {
        self.delete_calls
            .lock()
            .unwrap()
            .push((knowledge_base_id.to_string(), resource_path.to_string()));
        self.pause().await;
        if self.failing_delete.lock().unwrap().contains(resource_path) {
            return Err(AppError::Network("502 Bad Gateway".to_string()));
        }
        Ok(())
    }

    async fn probe_indexed(&self, resource_id: &str) -> Result<bool, AppError> {
        self.probe_calls
            .lock()
            .unwrap()
            .push(resource_id.to_string());
        self.pause().await;
        self.probe_answers
            .lock()
            .unwrap()
            .get(resource_id)
            .copied()
            .ok_or_else(|| AppError::NotFound(resource_id.to_string()))
    }
}

pub fn dir(id: &str, path: &str) -> Resource {
    Resource::new(id, ResourceKind::Directory, path)
}

pub fn file(id: &str, path: &str) -> Resource {
    Resource::new(id, ResourceKind::File, path)
}

pub fn test_config() -> AppConfig {
    AppConfig {
        org_id: Some("org-test".to_string()),
        db_path: ":memory:".into(),
        ..AppConfig::default()
    }
}

pub fn test_state(gateway: FakeGateway) -> SessionState<FakeGateway> {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    crate::data::migrations::run_migrations(&conn).unwrap();
    SessionState::new(gateway, conn, &test_config())
}
