//! Helpers for tests that touch process-wide environment variables.

use std::sync::{Mutex, MutexGuard, PoisonError};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Serialize tests that read or write environment variables.
pub fn lock_env() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the given variables and restores their previous values on drop.
///
/// Hold [`lock_env`] for as long as this guard lives.
pub struct ScopedEnv {
    saved: Vec<(&'static str, Option<String>)>,
}

impl ScopedEnv {
    pub fn new(vars: &[&'static str]) -> Self {
        let saved = vars
            .iter()
            .map(|&name| {
                let previous = std::env::var(name).ok();
                unsafe { std::env::remove_var(name) };
                (name, previous)
            })
            .collect();
        Self { saved }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (name, previous) in &self.saved {
            match previous {
                Some(value) => unsafe { std::env::set_var(name, value) },
                None => unsafe { std::env::remove_var(name) },
            }
        }
    }
}
