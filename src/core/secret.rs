//! Scoped secret handling.
//!
//! The warehouse CLI reads its passphrase from `SNOWSQL_PWD`. A
//! [`ScopedSecret`] exports that variable for exactly one authentication
//! attempt and erases it in `Drop`, so every exit path — success, failure,
//! early return, abandonment after the retry bound — releases it. Nothing
//! is ever written to persistent storage or logs.

use std::env;

pub const SECRET_ENV_VAR: &str = "SNOWSQL_PWD";

/// A passphrase scoped to one authentication attempt.
pub struct ScopedSecret {
    value: Vec<u8>,
}

impl ScopedSecret {
    /// Take ownership of a passphrase and export it for child processes.
    pub fn export(value: String) -> Self {
        env::set_var(SECRET_ENV_VAR, &value);
        Self {
            value: value.into_bytes(),
        }
    }

    pub fn is_exported() -> bool {
        env::var_os(SECRET_ENV_VAR).is_some()
    }
}

impl Drop for ScopedSecret {
    fn drop(&mut self) {
        env::remove_var(SECRET_ENV_VAR);
        for byte in self.value.iter_mut() {
            *byte = 0;
        }
        self.value.clear();
    }
}

/// Serializes tests that touch the process environment.
#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_is_exported_only_while_guard_lives() {
        let _env = env_test_lock();

        assert!(!ScopedSecret::is_exported());
        {
            let _secret = ScopedSecret::export("pass-123".to_string());
            assert!(ScopedSecret::is_exported());
            assert_eq!(env::var(SECRET_ENV_VAR).unwrap(), "pass-123");
        }
        assert!(!ScopedSecret::is_exported());
    }

    #[test]
    fn secret_is_erased_on_early_return() {
        let _env = env_test_lock();

        fn attempt() -> Result<(), ()> {
            let _secret = ScopedSecret::export("pass-456".to_string());
            Err(())
        }

        assert!(attempt().is_err());
        assert!(!ScopedSecret::is_exported());
    }

    #[test]
    fn repeated_attempts_never_leak_between_iterations() {
        let _env = env_test_lock();

        for round in 0..3 {
            let secret = ScopedSecret::export(format!("attempt-{}", round));
            drop(secret);
            assert!(!ScopedSecret::is_exported());
        }
    }
}
