use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use jobrelay_common::protocol::error::{JobRelayError, Result};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::code_source::{validate_tool_name, Artifact, CodeSource};
use crate::runtime::ScriptTool;
use crate::tool::Tool;

/// Cache entry for one tool name.
#[derive(Default)]
struct Slot {
    tool: OnceCell<Arc<dyn Tool>>,
    /// Held while loading; records the failure that ended this slot.
    gate: Mutex<Option<JobRelayError>>,
}

/// Resolves tool names to loaded tools, loading each name at most once.
///
/// # Caching
///
/// The cache maps a name to a slot. The map lock is held only long enough to
/// find or create the slot; the load itself runs under the slot's gate, so:
///
/// - concurrent first resolutions of one name share a single load and all
///   observe the same instance
/// - different names load in parallel
/// - a failed load is handed to every caller already waiting on that slot,
///   then the slot is removed; the next resolution starts a fresh load
///
/// Only loaded tools stay in the map. Entries are never evicted.
pub struct CodeLoader {
    source: Arc<dyn CodeSource>,
    cache: Mutex<HashMap<String, Arc<Slot>>>,
    loads: AtomicUsize,
}

impl CodeLoader {
    pub fn new(source: Arc<dyn CodeSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        }
    }

    /// Returns the tool registered under `name`, loading it on first use.
    ///
    /// # Errors
    /// - `UnknownTool` if the name is malformed or no source knows it
    /// - `LoadFailure` if the artifact cannot be fetched or instantiated
    pub async fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>> {
        validate_tool_name(name)?;

        let slot = {
            let mut cache = self.cache.lock().await;
            cache.entry(name.to_string()).or_default().clone()
        };

        if let Some(tool) = slot.tool.get() {
            debug!(tool = name, "Tool cache hit");
            return Ok(tool.clone());
        }

        let mut gate = slot.gate.lock().await;
        if let Some(tool) = slot.tool.get() {
            return Ok(tool.clone());
        }
        if let Some(failure) = gate.as_ref() {
            debug!(tool = name, "Sharing failed load");
            return Err(replay(name, failure));
        }

        match self.load(name).await {
            Ok(tool) => {
                // Only the gate holder sets the cell
                let _ = slot.tool.set(tool.clone());
                Ok(tool)
            }
            Err(e) => {
                *gate = Some(replay(name, &e));
                self.discard(name, &slot).await;
                Err(e)
            }
        }
    }

    /// Removes `slot` from the map unless it has already been replaced.
    async fn discard(&self, name: &str, slot: &Arc<Slot>) {
        let mut cache = self.cache.lock().await;
        if cache.get(name).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            cache.remove(name);
        }
    }

    async fn load(&self, name: &str) -> Result<Arc<dyn Tool>> {
        debug!(tool = name, source = %self.source.describe(), "Loading tool");

        let artifact = match self.source.fetch(name).await {
            Ok(artifact) => artifact,
            Err(e) => {
                warn!(tool = name, error = %e, "Tool fetch failed");
                return Err(e);
            }
        };

        let tool = Self::instantiate(name, artifact).await.inspect_err(|e| {
            warn!(tool = name, error = %e, "Tool instantiation failed");
        })?;

        self.loads.fetch_add(1, Ordering::Relaxed);
        info!(tool = name, "Tool loaded");
        Ok(tool)
    }

    async fn instantiate(name: &str, artifact: Artifact) -> Result<Arc<dyn Tool>> {
        match artifact {
            Artifact::Native(build) => build().map_err(|e| match e {
                JobRelayError::LoadFailure { .. } => e,
                other => JobRelayError::load_failure(name, other),
            }),
            Artifact::Script { source } => {
                // Evaluating the script can take arbitrarily long
                let owned = name.to_string();
                let compiled = tokio::task::spawn_blocking(move || ScriptTool::compile(owned, source))
                    .await
                    .map_err(|e| JobRelayError::load_failure(name, format!("compiler task failed: {}", e)))??;
                Ok(Arc::new(compiled) as Arc<dyn Tool>)
            }
        }
    }

    /// Whether `name` has been loaded successfully.
    pub async fn is_cached(&self, name: &str) -> bool {
        self.cache
            .lock()
            .await
            .get(name)
            .map(|slot| slot.tool.initialized())
            .unwrap_or(false)
    }

    /// Number of loaded tools.
    pub async fn cached_count(&self) -> usize {
        self.cache
            .lock()
            .await
            .values()
            .filter(|slot| slot.tool.initialized())
            .count()
    }

    /// Number of loads that completed successfully.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    pub fn source(&self) -> &Arc<dyn CodeSource> {
        &self.source
    }
}

/// Copy of a load failure for callers that shared the failed load.
fn replay(name: &str, error: &JobRelayError) -> JobRelayError {
    match error {
        JobRelayError::UnknownTool(tool) => JobRelayError::UnknownTool(tool.clone()),
        JobRelayError::LoadFailure { tool, reason } => JobRelayError::LoadFailure {
            tool: tool.clone(),
            reason: reason.clone(),
        },
        other => JobRelayError::load_failure(name, other),
    }
}
