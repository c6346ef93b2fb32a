use super::types::ConceptGraph;
use crate::error::{Result, SyllabusError};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Holder of the currently published graph.
///
/// Readers clone the `Arc` and keep a consistent snapshot for as long as
/// they need it; publishing swaps the pointer and never mutates a graph in
/// place.
pub struct GraphSnapshots {
    current: RwLock<Arc<ConceptGraph>>,
}

impl GraphSnapshots {
    pub fn new() -> Self {
        Self::with_graph(ConceptGraph::empty())
    }

    pub fn with_graph(graph: ConceptGraph) -> Self {
        Self {
            current: RwLock::new(Arc::new(graph)),
        }
    }

    pub fn current(&self) -> Arc<ConceptGraph> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn build_id(&self) -> u64 {
        self.current().build_id
    }

    /// Publish a graph if it is newer than the current one.
    /// Returns false for a stale build.
    pub fn publish(&self, graph: ConceptGraph) -> bool {
        self.publish_shared(Arc::new(graph))
    }

    /// Like `publish`, for a graph the caller keeps a handle to.
    pub fn publish_shared(&self, graph: Arc<ConceptGraph>) -> bool {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        if graph.build_id <= current.build_id {
            log::warn!(
                "Not publishing stale graph build #{} (current #{})",
                graph.build_id,
                current.build_id
            );
            return false;
        }
        log::info!(
            "Published graph build #{}: {} nodes, {} edges",
            graph.build_id,
            graph.node_count(),
            graph.edge_count()
        );
        *current = graph;
        true
    }

    /// Write a snapshot atomically (temp file + rename). The temp file is
    /// named after the build so concurrent saves never share one.
    pub fn save(graph: &ConceptGraph, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = bincode::serialize(graph)?;
        let tmp = path.with_extension(format!("{}.tmp", graph.build_id));
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<ConceptGraph> {
        let bytes = std::fs::read(path)?;
        bincode::deserialize(&bytes).map_err(SyllabusError::from)
    }
}

impl Default for GraphSnapshots {
    fn default() -> Self {
        Self::new()
    }
}
