use std::collections::HashMap;

use crate::CompiledCommand;

/// Per-connection map from raw statement text to its compiled form.
///
/// Entries are added on the first cacheable execution and live until the
/// owning database is dropped or the cache is cleared explicitly.
#[derive(Debug, Default)]
pub struct StatementCache {
    entries: HashMap<String, CompiledCommand>,
}

impl StatementCache {
    #[must_use]
    pub fn get(&self, raw_text: &str) -> Option<&CompiledCommand> {
        self.entries.get(raw_text)
    }

    #[must_use]
    pub fn contains(&self, raw_text: &str) -> bool {
        self.entries.contains_key(raw_text)
    }

    /// Stores `command` under its raw text, replacing an older compilation.
    pub fn insert(&mut self, command: CompiledCommand) {
        self.entries.insert(command.raw_text().to_string(), command);
    }

    pub fn remove(&mut self, raw_text: &str) -> Option<CompiledCommand> {
        self.entries.remove(raw_text)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
