// SPDX-License-Identifier: MIT

//! Provider account identity and cooldown-bearing record.

use crate::define_id;
use chrono::{DateTime, Utc};

define_id! {
    /// Identifies one provider account / credential profile.
    pub struct AccountId("acc-");
}

/// Which upstream provider an account authenticates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Anthropic,
    Openai,
    Google,
    Custom,
}

crate::simple_display! {
    Provider {
        Anthropic => "anthropic",
        Openai => "openai",
        Google => "google",
        Custom => "custom",
    }
}

/// An opaque reference to a credential, resolved lazily by `swarm-accounts`.
///
/// Never holds a resolved secret value itself, only the pointer to one.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialRef {
    /// A secret value passed through opaquely (e.g. from a vault the caller already read).
    Literal { secret: String },
    /// `env:NAME` — read from the process environment at bind time.
    EnvVar { name: String },
    /// `caam:provider/profile` — left for an injected resolver to satisfy.
    Caam { provider: String, profile: String },
}

/// Rolling usage statistics for an account, used to drive LRU rotation.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UsageStats {
    pub last_used: Option<DateTime<Utc>>,
    pub message_count: u64,
}

/// One provider account / credential profile.
///
/// Invariant: `available() == active && (cooldown_until.is_none() || cooldown_until <= now)`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub provider: Provider,
    pub profile_name: String,
    pub credential: CredentialRef,
    pub active: bool,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub usage: UsageStats,
}

impl Account {
    pub fn new(provider: Provider, profile_name: impl Into<String>, credential: CredentialRef) -> Self {
        Self {
            id: AccountId::new(),
            provider,
            profile_name: profile_name.into(),
            credential,
            active: true,
            cooldown_until: None,
            usage: UsageStats::default(),
        }
    }

    pub fn is_on_cooldown(&self, now: DateTime<Utc>) -> bool {
        matches!(self.cooldown_until, Some(until) if until > now)
    }

    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_on_cooldown(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn available_iff_active_and_not_cooling_down() {
        let mut account =
            Account::new(Provider::Anthropic, "work", CredentialRef::EnvVar { name: "X".into() });
        assert!(account.is_available(now()));

        account.cooldown_until = Some(now() + chrono::Duration::seconds(30));
        assert!(!account.is_available(now()));
        assert!(account.is_on_cooldown(now()));

        account.cooldown_until = Some(now() - chrono::Duration::seconds(1));
        assert!(account.is_available(now()));

        account.active = false;
        assert!(!account.is_available(now()));
    }
}
