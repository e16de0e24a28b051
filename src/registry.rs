//! Watched-source registry — the fixed list of spreadsheet feeds.

/// One watched tabular data feed: a spreadsheet + sheet name, plus the
/// application-type label stamped onto entries parsed from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Spreadsheet identifier (opaque to the engine).
    pub spreadsheet_id: String,
    /// Sheet (tab) name within the spreadsheet.
    pub sheet_name: String,
    /// Default application-type label, e.g. "Moderator" or "Beta".
    pub type_label: String,
}

impl SourceDescriptor {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        sheet_name: impl Into<String>,
        type_label: impl Into<String>,
    ) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
            type_label: type_label.into(),
        }
    }

    /// Stable key used for cursors, header caches, and the decision ledger.
    pub fn key(&self) -> String {
        format!("{}_{}", self.spreadsheet_id, self.sheet_name)
    }
}

/// Immutable, ordered set of watched sources. Fixed for the process
/// lifetime, so a source's index is a stable identifier within one run.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<SourceDescriptor>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<SourceDescriptor>) -> Self {
        Self { sources }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter()
    }

    /// Sources paired with their registry index (the index is what action
    /// tags embed).
    pub fn iter_indexed(&self) -> impl Iterator<Item = (usize, &SourceDescriptor)> {
        self.sources.iter().enumerate()
    }

    pub fn get(&self, index: usize) -> Option<&SourceDescriptor> {
        self.sources.get(index)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_joins_id_and_sheet() {
        let source = SourceDescriptor::new("abc123", "Form Responses 1", "Beta");
        assert_eq!(source.key(), "abc123_Form Responses 1");
    }

    #[test]
    fn registry_order_is_preserved() {
        let registry = SourceRegistry::new(vec![
            SourceDescriptor::new("a", "S", "Moderator"),
            SourceDescriptor::new("b", "S", "Beta"),
        ]);
        let labels: Vec<_> = registry.iter().map(|s| s.type_label.as_str()).collect();
        assert_eq!(labels, ["Moderator", "Beta"]);
        assert_eq!(registry.get(1).unwrap().spreadsheet_id, "b");
        assert!(registry.get(2).is_none());
    }
}
