//! Append-only JSON Lines store.
//!
//! Writes `documents.jsonl` and `chunks.jsonl` under one directory. Later
//! lines win on read, so an upsert is an append.

use async_trait::async_trait;
use planscope_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{DocumentMeta, VectorRecord, VectorStore};

const DOCUMENTS_FILE: &str = "documents.jsonl";
const CHUNKS_FILE: &str = "chunks.jsonl";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentLine {
    uuid: Uuid,
    #[serde(flatten)]
    meta: DocumentMeta,
}

#[derive(Debug)]
pub struct JsonlStore {
    dir: PathBuf,
    /// document_id -> uuid, loaded from existing lines on open
    known: Mutex<HashMap<String, Uuid>>,
}

impl JsonlStore {
    /// Open (creating if needed) a store directory.
    pub fn open(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            AppError::DownstreamUnavailable(format!(
                "Failed to create store directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let mut known = HashMap::new();
        let documents = dir.join(DOCUMENTS_FILE);
        if documents.exists() {
            let content = std::fs::read_to_string(&documents)?;
            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                let parsed: DocumentLine = serde_json::from_str(line)?;
                known.insert(parsed.meta.document_id, parsed.uuid);
            }
        }
        debug!(dir = %dir.display(), documents = known.len(), "Opened jsonl store");

        Ok(Self {
            dir,
            known: Mutex::new(known),
        })
    }

    async fn append(&self, file: &str, lines: &[String]) -> AppResult<()> {
        let path = self.dir.join(file);
        let mut handle = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                AppError::DownstreamUnavailable(format!("Failed to open {}: {}", path.display(), e))
            })?;

        let mut buffer = String::new();
        for line in lines {
            buffer.push_str(line);
            buffer.push('\n');
        }
        handle.write_all(buffer.as_bytes()).await.map_err(|e| {
            AppError::DownstreamUnavailable(format!("Failed to write {}: {}", path.display(), e))
        })?;
        handle.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for JsonlStore {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn upsert_document(&self, meta: &DocumentMeta) -> AppResult<Uuid> {
        let mut known = self.known.lock().await;
        let uuid = *known
            .entry(meta.document_id.clone())
            .or_insert_with(Uuid::new_v4);

        let line = serde_json::to_string(&DocumentLine {
            uuid,
            meta: meta.clone(),
        })?;
        self.append(DOCUMENTS_FILE, &[line]).await?;
        Ok(uuid)
    }

    async fn upsert(&self, records: &[VectorRecord]) -> AppResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let lines = records
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        self.append(CHUNKS_FILE, &lines).await?;
        debug!("Appended {} records", records.len());
        Ok(())
    }
}
