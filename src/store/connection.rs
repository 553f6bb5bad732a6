//! Store connection descriptor

use serde::{Deserialize, Serialize};

/// Where a store lives and how it is written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Document file path, or SQLite database path
    pub database: String,
    #[serde(default)]
    pub options: ConnectionOptions,
}

impl Connection {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            options: ConnectionOptions::default(),
        }
    }

    /// Pretty-print the document file with this indent width
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.options.indent = Some(indent);
        self
    }

    /// Write document file keys in sorted order
    pub fn with_sort_keys(mut self, sort_keys: bool) -> Self {
        self.options.sort_keys = sort_keys;
        self
    }
}

/// Document file formatting options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// `None` writes compact JSON
    #[serde(default)]
    pub indent: Option<usize>,
    #[serde(default)]
    pub sort_keys: bool,
}
