//! Inspect command implementation.

use super::to_hex;
use recordsync_engine::{CursorStore, FileKeyValueStore, KeyValueStore, SyncConfig};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// State file inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// State file path.
    pub path: String,
    /// State file size in bytes.
    pub file_size: u64,
    /// Stored entries.
    pub entries: Vec<EntryInfo>,
    /// Decoded engine state (if a namespace was requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<NamespaceInfo>,
}

/// A single stored entry.
#[derive(Debug, Serialize)]
pub struct EntryInfo {
    /// Entry key.
    pub key: String,
    /// Value size in bytes.
    pub size: usize,
}

/// Engine state stored under one namespace.
#[derive(Debug, Serialize)]
pub struct NamespaceInfo {
    /// Namespace.
    pub namespace: String,
    /// Change cursor as hex, if one is stored.
    pub cursor: Option<String>,
    /// Last account identity, if one is stored.
    pub account: Option<String>,
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    namespace: Option<&str>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, namespace)?;

    // Output
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Reads the state file at `path`.
pub fn inspect(
    path: &Path,
    namespace: Option<&str>,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No state file found at {:?}", path).into());
    }

    let file_size = std::fs::metadata(path)?.len();
    let store = Arc::new(FileKeyValueStore::open(path)?);

    let prefix = namespace.map(|ns| format!("{ns}."));
    let mut entries = Vec::new();
    for key in store.keys() {
        if prefix.as_deref().is_some_and(|p| !key.starts_with(p)) {
            continue;
        }
        let size = store.load(&key)?.map_or(0, |value| value.len());
        entries.push(EntryInfo { key, size });
    }

    let namespace = match namespace {
        Some(ns) => {
            let config = SyncConfig::new(ns);
            let cursors = CursorStore::new(store.clone(), config.cursor_key());
            let account = store
                .load(&config.account_key())?
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
            Some(NamespaceInfo {
                namespace: ns.to_string(),
                cursor: cursors.load()?.map(|cursor| to_hex(cursor.as_bytes())),
                account,
            })
        }
        None => None,
    };

    Ok(InspectResult {
        path: path.display().to_string(),
        file_size,
        entries,
        namespace,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("RecordSync State Inspection");
    println!("===========================");
    println!();
    println!("Path: {}", result.path);
    println!("File size: {} bytes", result.file_size);
    println!();
    println!("Entries: {}", result.entries.len());
    for entry in &result.entries {
        println!("  {:<40} {:>6} bytes", entry.key, entry.size);
    }

    if let Some(ns) = &result.namespace {
        println!();
        println!("Namespace: {}", ns.namespace);
        match &ns.cursor {
            Some(cursor) => println!("  Cursor:  {}", cursor),
            None => println!("  Cursor:  (none, next pass fetches everything)"),
        }
        match &ns.account {
            Some(account) => println!("  Account: {}", account),
            None => println!("  Account: (none)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordsync_model::Cursor;
    use tempfile::TempDir;

    #[test]
    fn inspect_reports_namespace_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.cbor");
        {
            let store = Arc::new(FileKeyValueStore::open(&path).unwrap());
            let config = SyncConfig::new("app.notes");
            CursorStore::new(store.clone(), config.cursor_key())
                .save(&Cursor::from_bytes(vec![0xde, 0xad]))
                .unwrap();
            store.save(&config.account_key(), b"user-1").unwrap();
            store.save("app.other.change_cursor", &[1]).unwrap();
        }

        let all = inspect(&path, None).unwrap();
        assert_eq!(all.entries.len(), 3);
        assert!(all.namespace.is_none());

        let notes = inspect(&path, Some("app.notes")).unwrap();
        assert_eq!(notes.entries.len(), 2);
        let ns = notes.namespace.unwrap();
        assert_eq!(ns.cursor.as_deref(), Some("dead"));
        assert_eq!(ns.account.as_deref(), Some("user-1"));
    }

    #[test]
    fn inspect_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(inspect(&dir.path().join("missing.cbor"), None).is_err());
    }
}
