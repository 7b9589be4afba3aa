//! On-disk snapshots of committed index state.
//!
//! Layout under the data directory:
//!
//! ```text
//! <data_dir>/<index uid>/index.json       uid, primary key, timestamps, settings
//! <data_dir>/<index uid>/documents.jsonl  one document per line, insertion order
//! ```
//!
//! Both files are rewritten through a temp file in the same directory and
//! renamed into place, so a crash mid-write keeps the previous snapshot.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::document::extract_document_id;
use super::settings::IndexSettings;
use super::IndexState;
use crate::error::{GriddleError, Result};
use crate::types::{Document, IndexUid};

const META_FILE: &str = "index.json";
const DOCUMENTS_FILE: &str = "documents.jsonl";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredIndexMeta {
    uid: IndexUid,
    primary_key: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    settings: IndexSettings,
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Storage { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_dir(&self, uid: &str) -> PathBuf {
        self.root.join(uid)
    }

    pub fn save(&self, state: &IndexState) -> Result<()> {
        let dir = self.index_dir(&state.uid);
        fs::create_dir_all(&dir)?;

        let meta = StoredIndexMeta {
            uid: state.uid.clone(),
            primary_key: state.primary_key.clone(),
            created_at: state.created_at,
            updated_at: state.updated_at,
            settings: state.settings.clone(),
        };
        write_atomic(&dir, META_FILE, |out| {
            serde_json::to_writer_pretty(&mut *out, &meta)?;
            Ok(())
        })?;

        write_atomic(&dir, DOCUMENTS_FILE, |out| {
            for doc in state.documents.values() {
                serde_json::to_writer(&mut *out, &**doc)?;
                out.write_all(b"\n")?;
            }
            Ok(())
        })?;

        tracing::debug!(
            "[STORE {}] saved {} documents to {}",
            state.uid,
            state.documents.len(),
            dir.display()
        );
        Ok(())
    }

    /// Load every index directory under the root, in uid order.
    pub fn load_all(&self) -> Result<Vec<IndexState>> {
        let mut dirs: Vec<PathBuf> = fs::read_dir(&self.root)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.join(META_FILE).is_file())
            .collect();
        dirs.sort();

        let mut states = Vec::with_capacity(dirs.len());
        for dir in dirs {
            let state = load_index(&dir)?;
            tracing::info!(
                "[STORE {}] loaded {} documents",
                state.uid,
                state.documents.len()
            );
            states.push(state);
        }
        Ok(states)
    }

    pub fn remove(&self, uid: &str) -> Result<()> {
        let dir = self.index_dir(uid);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn write_atomic(dir: &Path, name: &str, fill: impl FnOnce(&mut BufWriter<&mut File>) -> Result<()>) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        fill(&mut out)?;
        out.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(name)).map_err(|e| GriddleError::Io(e.to_string()))?;
    Ok(())
}

fn load_index(dir: &Path) -> Result<IndexState> {
    let meta: StoredIndexMeta = serde_json::from_reader(BufReader::new(File::open(dir.join(META_FILE))?))?;

    let mut documents = IndexMap::new();
    let docs_path = dir.join(DOCUMENTS_FILE);
    if docs_path.is_file() {
        for (position, line) in BufReader::new(File::open(&docs_path)?).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let primary_key = meta.primary_key.as_deref().ok_or_else(|| {
                GriddleError::Internal(format!("index `{}` has documents but no primary key", meta.uid))
            })?;
            let doc: Document = serde_json::from_str(&line)?;
            let id = extract_document_id(&doc, primary_key, position)?;
            documents.insert(id, Arc::new(doc));
        }
    }

    Ok(IndexState {
        uid: meta.uid,
        primary_key: meta.primary_key,
        created_at: meta.created_at,
        updated_at: meta.updated_at,
        settings: meta.settings,
        documents,
    })
}
