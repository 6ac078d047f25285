// SPDX-License-Identifier: MIT

//! The Account Registry (spec §4.5): cooldown bookkeeping and LRU-style
//! rotation across accounts that share a provider.

use crate::error::AccountError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use swarm_core::{Account, AccountId, Clock, EntityType, Event, EventType};
use swarm_storage::EventLog;

/// Owns every known [`Account`] and appends `account.rotated` /
/// `cooldown.started` events as side effects of its own operations.
pub struct AccountRegistry<C: Clock> {
    accounts: RwLock<HashMap<AccountId, Account>>,
    clock: C,
    event_log: Arc<dyn EventLog>,
}

impl<C: Clock> AccountRegistry<C> {
    pub fn new(clock: C, event_log: Arc<dyn EventLog>) -> Self {
        Self { accounts: RwLock::new(HashMap::new()), clock, event_log }
    }

    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.clock.epoch_ms() as i64).unwrap_or_else(Utc::now)
    }

    pub fn register(&self, account: Account) {
        self.accounts.write().insert(account.id, account);
    }

    pub fn get(&self, id: AccountId) -> Result<Account, AccountError> {
        self.accounts
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| AccountError::NotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<Account> {
        self.accounts.read().values().cloned().collect()
    }

    /// Records that `id` was just dispatched to: bumps `usage.message_count`
    /// and sets `usage.last_used` to now, for the next rotation's ordering.
    pub fn record_usage(&self, id: AccountId) -> Result<(), AccountError> {
        let mut accounts = self.accounts.write();
        let account = accounts.get_mut(&id).ok_or_else(|| AccountError::NotFound(id.to_string()))?;
        account.usage.last_used = Some(self.now());
        account.usage.message_count += 1;
        Ok(())
    }

    pub fn is_on_cooldown(&self, id: AccountId) -> Result<bool, AccountError> {
        Ok(self.get(id)?.is_on_cooldown(self.now()))
    }

    /// `None` when `id` is not currently cooling down.
    pub fn cooldown_remaining(&self, id: AccountId) -> Result<Option<ChronoDuration>, AccountError> {
        let account = self.get(id)?;
        let now = self.now();
        Ok(match account.cooldown_until {
            Some(until) if until > now => Some(until - now),
            _ => None,
        })
    }

    /// Sets a cooldown that expires at `now + duration` and appends a
    /// `cooldown.started` event.
    pub fn set_cooldown(&self, id: AccountId, duration: ChronoDuration, reason: &str) -> Result<(), AccountError> {
        let now = self.now();
        {
            let mut accounts = self.accounts.write();
            let account = accounts.get_mut(&id).ok_or_else(|| AccountError::NotFound(id.to_string()))?;
            account.cooldown_until = Some(now + duration);
        }

        let _ = self.event_log.append(
            Event::new(EventType::CooldownStarted, EntityType::Account, id.to_string())
                .with_metadata("reason", reason)
                .with_metadata("duration_ms", duration.num_milliseconds().to_string()),
        );
        Ok(())
    }

    pub fn clear_cooldown(&self, id: AccountId) -> Result<(), AccountError> {
        let mut accounts = self.accounts.write();
        let account = accounts.get_mut(&id).ok_or_else(|| AccountError::NotFound(id.to_string()))?;
        account.cooldown_until = None;
        Ok(())
    }

    /// Picks the least-recently-used available account sharing `current`'s
    /// provider, excluding `current` itself. Candidates are ordered by
    /// `(usage.last_used ascending, profile_name ascending)`; accounts that
    /// have never been used sort before any that have. Fails with
    /// [`AccountError::NoAvailableAccounts`] on an empty candidate set and
    /// writes no event in that case.
    pub fn rotate(&self, current: AccountId, reason: &str) -> Result<Account, AccountError> {
        let now = self.now();
        let current_account = self.get(current)?;

        let mut candidates: Vec<Account> = self
            .accounts
            .read()
            .values()
            .filter(|a| a.id != current && a.provider == current_account.provider && a.is_available(now))
            .cloned()
            .collect();

        candidates.sort_by(|a, b| (a.usage.last_used, &a.profile_name).cmp(&(b.usage.last_used, &b.profile_name)));

        let chosen = candidates.into_iter().next().ok_or(AccountError::NoAvailableAccounts)?;

        let _ = self.event_log.append(
            Event::new(EventType::AccountRotated, EntityType::Account, chosen.id.to_string())
                .with_metadata("from", current.to_string())
                .with_metadata("reason", reason),
        );

        Ok(chosen)
    }
}
