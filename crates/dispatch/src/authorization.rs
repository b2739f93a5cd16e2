use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, OnceLock,
};

static GLOBAL: OnceLock<AuthorizationFlag> = OnceLock::new();

/// Switch deciding whether every action needs an authorization policy.
///
/// Clones share one atomic. Stores use `Release` and loads `Acquire`, so a
/// toggle from one handler is seen by every later read on other threads.
#[derive(Debug, Clone)]
pub struct AuthorizationFlag {
    verify: Arc<AtomicBool>,
}

impl AuthorizationFlag {
    pub fn new(verify: bool) -> Self {
        Self {
            verify: Arc::new(AtomicBool::new(verify)),
        }
    }

    /// Process-wide flag, verifying by default.
    pub fn global() -> Self {
        GLOBAL.get_or_init(|| Self::new(true)).clone()
    }

    pub fn verify(&self) {
        self.set(true);
    }

    pub fn unverify(&self) {
        self.set(false);
    }

    pub fn set(&self, verify: bool) {
        self.verify.store(verify, Ordering::Release);
    }

    pub fn is_verifying(&self) -> bool {
        self.verify.load(Ordering::Acquire)
    }
}

impl Default for AuthorizationFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
#[path = "tests/authorization_tests.rs"]
mod tests;
