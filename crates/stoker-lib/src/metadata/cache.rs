use crate::error::Result;
use crate::metadata::types::ArtifactFacts;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Default location of the process-wide facts cache file.
pub const FACTS_CACHE_FILE: &str = "versions.json";

/// On-disk memoization of per-version artifact facts, keyed by version id.
///
/// The file is read at most once per process lifetime and rewritten in full
/// on every merge. Entries are append-only: once a version id is recorded its
/// facts are never re-validated (released metadata does not change upstream).
/// Construct one per test with a scratch path instead of sharing state.
#[derive(Debug)]
pub struct FactsCache {
    path: PathBuf,
    state: Mutex<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    loaded: bool,
    entries: HashMap<String, ArtifactFacts>,
}

impl FactsCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Cache file in the current working directory.
    pub fn default_path() -> PathBuf {
        PathBuf::from(FACTS_CACHE_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Facts for one version id, if already cached.
    pub async fn get(&self, id: &str) -> Result<Option<ArtifactFacts>> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await?;
        Ok(state.entries.get(id).copied())
    }

    /// Of the given ids, the ones not yet cached.
    pub async fn missing<'a>(&self, ids: impl Iterator<Item = &'a str>) -> Result<Vec<String>> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await?;
        Ok(ids
            .filter(|id| !state.entries.contains_key(*id))
            .map(|id| id.to_string())
            .collect())
    }

    /// Merge newly fetched facts and rewrite the cache file in full.
    /// Existing entries win; the cache is append-only.
    pub async fn merge(&self, fresh: HashMap<String, ArtifactFacts>) -> Result<()> {
        if fresh.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await?;
        for (id, facts) in fresh {
            state.entries.entry(id).or_insert(facts);
        }

        let json = serde_json::to_string_pretty(&state.entries)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(&self.path, json).await?;
        log::debug!(
            "Saved {} artifact-fact entries to {:?}",
            state.entries.len(),
            self.path
        );
        Ok(())
    }

    /// Snapshot of all cached entries.
    pub async fn entries(&self) -> Result<HashMap<String, ArtifactFacts>> {
        let mut state = self.state.lock().await;
        self.ensure_loaded(&mut state).await?;
        Ok(state.entries.clone())
    }

    async fn ensure_loaded(&self, state: &mut CacheState) -> Result<()> {
        if state.loaded {
            return Ok(());
        }

        match fs::read_to_string(&self.path).await {
            Ok(contents) => {
                state.entries = serde_json::from_str(&contents).unwrap_or_else(|e| {
                    log::warn!(
                        "Facts cache {:?} is unreadable ({}), starting over",
                        self.path,
                        e
                    );
                    HashMap::new()
                });
                log::debug!(
                    "Loaded {} artifact-fact entries from {:?}",
                    state.entries.len(),
                    self.path
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No facts cache at {:?}, starting empty", self.path);
            }
            Err(e) => return Err(e.into()),
        }

        state.loaded = true;
        Ok(())
    }
}
