use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use dashboard_core::AnalysisResult;

/// Identifier -> analysis result, write-once per key and never invalidated.
#[derive(Debug, Clone, Default)]
pub struct AnalysisCache {
    entries: Arc<RwLock<HashMap<String, Arc<AnalysisResult>>>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<AnalysisResult>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(identifier).cloned()
    }

    /// Stores `result` unless the key is already populated; returns the cached value.
    pub fn insert(&self, identifier: &str, result: AnalysisResult) -> Arc<AnalysisResult> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .entry(identifier.to_string())
            .or_insert_with(|| Arc::new(result))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
