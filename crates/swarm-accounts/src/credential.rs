// SPDX-License-Identifier: MIT

//! Lazy credential resolution (spec §4.5). References are resolved on
//! demand and the resolved value is never logged or persisted.

use crate::error::AccountError;
use swarm_core::CredentialRef;

/// Satisfies `CredentialRef::Caam` references. Injected so that resolution
/// stays testable without touching any real secret store.
pub trait CaamResolver: Send + Sync {
    fn resolve(&self, provider: &str, profile: &str) -> Option<String>;
}

/// Resolves via the process environment only, used when no `caam` backend
/// is configured.
pub struct NoCaamResolver;

impl CaamResolver for NoCaamResolver {
    fn resolve(&self, _provider: &str, _profile: &str) -> Option<String> {
        None
    }
}

/// Resolve a credential reference to its secret value.
///
/// `Literal` passes its value through unchanged, `EnvVar` reads the named
/// process environment variable at call time, and `Caam` defers to the
/// injected resolver. None of the three branches log the resolved value.
pub fn resolve(reference: &CredentialRef, caam: &dyn CaamResolver) -> Result<String, AccountError> {
    match reference {
        CredentialRef::Literal { secret } => Ok(secret.clone()),
        CredentialRef::EnvVar { name } => std::env::var(name)
            .map_err(|_| AccountError::CredentialUnresolved(format!("env:{name}"))),
        CredentialRef::Caam { provider, profile } => caam
            .resolve(provider, profile)
            .ok_or_else(|| AccountError::CredentialUnresolved(format!("caam:{provider}/{profile}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeCaam;
    impl CaamResolver for FakeCaam {
        fn resolve(&self, provider: &str, profile: &str) -> Option<String> {
            if provider == "anthropic" && profile == "work" {
                Some("resolved-secret".into())
            } else {
                None
            }
        }
    }

    #[test]
    fn literal_passes_through() {
        let reference = CredentialRef::Literal { secret: "s3cr3t".into() };
        assert_eq!(resolve(&reference, &NoCaamResolver).unwrap(), "s3cr3t");
    }

    #[test]
    fn env_var_reads_process_environment() {
        std::env::set_var("SWARM_TEST_CRED_XYZ", "from-env");
        let reference = CredentialRef::EnvVar { name: "SWARM_TEST_CRED_XYZ".into() };
        assert_eq!(resolve(&reference, &NoCaamResolver).unwrap(), "from-env");
        std::env::remove_var("SWARM_TEST_CRED_XYZ");
    }

    #[test]
    fn missing_env_var_fails_unresolved() {
        let reference = CredentialRef::EnvVar { name: "SWARM_TEST_CRED_DOES_NOT_EXIST".into() };
        assert!(matches!(resolve(&reference, &NoCaamResolver), Err(AccountError::CredentialUnresolved(_))));
    }

    #[test]
    fn caam_reference_defers_to_injected_resolver() {
        let reference = CredentialRef::Caam { provider: "anthropic".into(), profile: "work".into() };
        assert_eq!(resolve(&reference, &FakeCaam).unwrap(), "resolved-secret");
    }

    #[test]
    fn caam_reference_without_backend_fails_unresolved() {
        let reference = CredentialRef::Caam { provider: "anthropic".into(), profile: "work".into() };
        assert!(matches!(resolve(&reference, &NoCaamResolver), Err(AccountError::CredentialUnresolved(_))));
    }
}
