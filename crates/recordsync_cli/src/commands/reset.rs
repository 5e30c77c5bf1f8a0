//! Reset command implementations.

use super::to_hex;
use recordsync_engine::{CursorStore, FileKeyValueStore, KeyValueStore, SyncConfig};
use std::path::Path;
use std::sync::Arc;

/// Discards the change cursor of `namespace`.
///
/// Returns true if a cursor was stored.
pub fn reset_cursor(
    path: &Path,
    namespace: &str,
    dry_run: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let cursors = CursorStore::new(store, SyncConfig::new(namespace).cursor_key());

    let Some(cursor) = cursors.load()? else {
        println!("No cursor stored for {namespace}");
        return Ok(false);
    };

    if dry_run {
        println!(
            "Would discard cursor {} for {namespace}",
            to_hex(cursor.as_bytes())
        );
    } else {
        cursors.clear()?;
        println!("Discarded cursor for {namespace}; the next pass fetches everything");
    }
    Ok(true)
}

/// Discards the stored account identity of `namespace`.
///
/// Returns true if an identity was stored.
pub fn forget_account(path: &Path, namespace: &str) -> Result<bool, Box<dyn std::error::Error>> {
    let store = open_existing(path)?;
    let key = SyncConfig::new(namespace).account_key();

    if store.load(&key)?.is_none() {
        println!("No account stored for {namespace}");
        return Ok(false);
    }
    store.remove(&key)?;
    println!("Forgot account for {namespace}; the next check reports a first sync");
    Ok(true)
}

fn open_existing(path: &Path) -> Result<Arc<FileKeyValueStore>, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No state file found at {:?}", path).into());
    }
    Ok(Arc::new(FileKeyValueStore::open(path)?))
}
