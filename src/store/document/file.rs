//! Document file persistence
//!
//! The whole store lives in one JSON file:
//!
//! ```text
//! {"tables": {"artists": {"columns": ["name", "songs"],
//!                          "entries": [{"name": "john", "songs": {"$DATE": "2020-12-24"}}]}}}
//! ```
//!
//! Every mutation rewrites the file: the new content goes to a sibling temp
//! file which is then renamed over the original.

use crate::record::{OrderedMap, Record};
use crate::store::connection::ConnectionOptions;
use crate::store::error::StoreResult;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// In-memory image of a document file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreFile {
    #[serde(default)]
    pub tables: OrderedMap<Table>,
}

/// One document (table) and its entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column order from the first insert
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub entries: Vec<Record>,
}

impl StoreFile {
    /// Load a store file; a missing file is an empty store
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Ok(Self::default()),
            Ok(content) => {
                let store: Self = serde_json::from_str(&content)?;
                debug!(path = %path.display(), tables = store.tables.len(), "Loaded document store");
                Ok(store)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Document store not found, starting empty");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically replace the file at `path` with this store
    pub fn save(&self, path: impl AsRef<Path>, options: &ConnectionOptions) -> StoreResult<()> {
        let path = path.as_ref();
        let tmp_path = temp_path(path);

        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer, options)?;
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| e.into_error())?
            .sync_all()?;

        fs::rename(&tmp_path, path)?;
        debug!(path = %path.display(), "Document store saved");
        Ok(())
    }

    /// Serialize with the connection's formatting options
    pub fn write_to<W: Write>(&self, writer: W, options: &ConnectionOptions) -> StoreResult<()> {
        if options.sort_keys {
            // serde_json maps are ordered by key
            let sorted = serde_json::to_value(self)?;
            write_json(writer, &sorted, options.indent)
        } else {
            write_json(writer, self, options.indent)
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }
}

fn write_json<W: Write, T: Serialize>(
    writer: W,
    value: &T,
    indent: Option<usize>,
) -> StoreResult<()> {
    match indent {
        Some(width) => {
            let indent = " ".repeat(width);
            let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
            let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
            value.serialize(&mut serializer)?;
        }
        None => serde_json::to_writer(writer, value)?,
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
