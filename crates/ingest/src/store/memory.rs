//! In-memory store, for tests and dry runs.

use async_trait::async_trait;
use planscope_core::AppResult;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{DocumentMeta, VectorRecord, VectorStore};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: Arc<RwLock<HashMap<String, (Uuid, DocumentMeta)>>>,
    records: Arc<RwLock<HashMap<String, VectorRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records of one document, ordered by chunk index.
    pub async fn records_for(&self, document_id: &str) -> Vec<VectorRecord> {
        let records = self.records.read().await;
        let mut found: Vec<VectorRecord> = records
            .values()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.metadata.chunk_index);
        found
    }

    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert_document(&self, meta: &DocumentMeta) -> AppResult<Uuid> {
        let mut documents = self.documents.write().await;
        let uuid = documents
            .get(&meta.document_id)
            .map(|(uuid, _)| *uuid)
            .unwrap_or_else(Uuid::new_v4);
        documents.insert(meta.document_id.clone(), (uuid, meta.clone()));
        debug!(document_id = %meta.document_id, %uuid, "Upserted document");
        Ok(uuid)
    }

    async fn upsert(&self, records: &[VectorRecord]) -> AppResult<()> {
        let mut store = self.records.write().await;
        for record in records {
            store.insert(record.id.clone(), record.clone());
        }
        debug!("Upserted {} records", records.len());
        Ok(())
    }
}
