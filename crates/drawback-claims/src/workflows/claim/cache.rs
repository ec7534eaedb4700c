use std::collections::HashMap;

use tracing::debug;

use super::domain::{AnalysisKey, AnalysisResult, ExportId, ImportId};

/// Session-lifetime memo of analysis results keyed by (import, export).
///
/// Last write wins. Import-only analyses are keyed with an absent export id and never answer
/// lookups for a paired key.
#[derive(Debug, Default, Clone)]
pub struct AnalysisCache {
    entries: HashMap<AnalysisKey, AnalysisResult>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &AnalysisKey) -> Option<&AnalysisResult> {
        self.entries.get(key)
    }

    pub fn put(&mut self, key: AnalysisKey, result: AnalysisResult) {
        debug!(key = %key, "caching analysis result");
        self.entries.insert(key, result);
    }

    /// Drop every entry matching the given ids; an absent id matches anything.
    pub fn invalidate(&mut self, import_id: Option<&ImportId>, export_id: Option<&ExportId>) {
        let before = self.entries.len();
        self.entries.retain(|key, _| {
            let import_matches = import_id.map_or(true, |id| &key.import_id == id);
            let export_matches = export_id.map_or(true, |id| key.export_id.as_ref() == Some(id));
            !(import_matches && export_matches)
        });
        debug!(removed = before - self.entries.len(), "invalidated cached analyses");
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
