//! Signed-in account tracking.

use crate::engine::SyncEngine;
use crate::error::SyncResult;
use crate::remote::RemoteService;
use crate::store::LocalStore;
use recordsync_model::{AccountState, Syncable};
use tracing::info;

impl<T, L, R> SyncEngine<T, L, R>
where
    T: Syncable,
    L: LocalStore<T>,
    R: RemoteService,
{
    /// Compares the signed-in account with the one stored by the last check
    /// and stores the current one.
    ///
    /// Callers typically wipe local data and reset the cursor when this
    /// returns [`AccountState::Changed`].
    pub async fn check_account_change(&self) -> SyncResult<AccountState> {
        let current = self.remote.fetch_current_user().await?;
        let key = self.config.account_key();

        let stored = self
            .defaults
            .load(&key)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());

        let state = match stored {
            None => AccountState::FirstSync,
            Some(previous) if previous == current => AccountState::AlreadySynced,
            Some(_) => AccountState::Changed,
        };
        if state != AccountState::AlreadySynced {
            self.defaults.save(&key, current.as_bytes())?;
        }

        info!(?state, "account checked");
        Ok(state)
    }

    /// Returns the account stored by the last check, if any.
    pub fn stored_account(&self) -> SyncResult<Option<String>> {
        Ok(self
            .defaults
            .load(&self.config.account_key())?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }
}
