// /////////////////////////////////////////////////////////////////////////////
// Tenure Claims Intake RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Per-Package Advisory Locks
//!
//! Within one package, pipeline stages are strictly sequential; across
//! packages, handlers run freely in parallel. The registry enforces the
//! former: a stage acquires the lock for its package id and a second
//! request while the lock is held fails with `PackageBusy`. The guard is
//! RAII - the lock releases on every exit path, including panics and early
//! `?` returns.
//!
//! The lock entry also carries the cancellation flag. A cancel request
//! against a running stage sets the flag; the stage observes it at its next
//! suspension point and aborts.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use tenure_intake_domain::IntakeError;

#[derive(Default, Debug)]
struct LockState {
    cancel_requested: AtomicBool,
}

/// Process-local advisory lock registry keyed by package id.
#[derive(Default, Clone)]
pub struct PackageLockRegistry {
    inner: Arc<Mutex<HashMap<Uuid, Arc<LockState>>>>,
}

impl PackageLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the stage lock for a package, or fails with `PackageBusy`
    /// when another stage holds it.
    pub fn acquire(&self, package_id: Uuid, stage: &str) -> Result<PackageLockGuard, IntakeError> {
        let mut map = self.inner.lock();
        if map.contains_key(&package_id) {
            return Err(IntakeError::PackageBusy(format!(
                "package {} already has a stage in progress ({} rejected)",
                package_id, stage
            )));
        }
        let state = Arc::new(LockState::default());
        map.insert(package_id, state.clone());
        Ok(PackageLockGuard {
            registry: self.inner.clone(),
            package_id,
            state,
        })
    }

    /// Flags a running stage for cancellation. Returns true when a stage
    /// was running (and will observe the flag), false when the package was
    /// idle.
    pub fn request_cancel(&self, package_id: Uuid) -> bool {
        let map = self.inner.lock();
        match map.get(&package_id) {
            Some(state) => {
                state.cancel_requested.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }
}

/// RAII lock over one package's pipeline stage.
#[derive(Debug)]
pub struct PackageLockGuard {
    registry: Arc<Mutex<HashMap<Uuid, Arc<LockState>>>>,
    package_id: Uuid,
    state: Arc<LockState>,
}

impl PackageLockGuard {
    /// Whether a cancellation request arrived since the stage started.
    /// Stages poll this at suspension points.
    pub fn is_cancel_requested(&self) -> bool {
        self.state.cancel_requested.load(Ordering::SeqCst)
    }

    /// Returns `Cancelled` when a cancellation request is pending, for use
    /// with `?` at suspension points.
    pub fn check_cancelled(&self) -> Result<(), IntakeError> {
        if self.is_cancel_requested() {
            return Err(IntakeError::Cancelled(format!(
                "package {} stage interrupted by cancellation request",
                self.package_id
            )));
        }
        Ok(())
    }
}

impl Drop for PackageLockGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.package_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_busy() {
        let registry = PackageLockRegistry::new();
        let id = Uuid::new_v4();
        let _guard = registry.acquire(id, "validate").unwrap();
        let err = registry.acquire(id, "commit").unwrap_err();
        assert!(matches!(err, IntakeError::PackageBusy(_)));
    }

    #[test]
    fn test_lock_releases_on_drop() {
        let registry = PackageLockRegistry::new();
        let id = Uuid::new_v4();
        drop(registry.acquire(id, "validate").unwrap());
        assert!(registry.acquire(id, "commit").is_ok());
    }

    #[test]
    fn test_independent_packages_do_not_contend() {
        let registry = PackageLockRegistry::new();
        let _a = registry.acquire(Uuid::new_v4(), "validate").unwrap();
        let _b = registry.acquire(Uuid::new_v4(), "validate").unwrap();
    }

    #[test]
    fn test_cancel_flag_reaches_running_stage() {
        let registry = PackageLockRegistry::new();
        let id = Uuid::new_v4();
        let guard = registry.acquire(id, "commit").unwrap();
        assert!(!guard.is_cancel_requested());
        assert!(registry.request_cancel(id));
        assert!(guard.is_cancel_requested());
        assert!(guard.check_cancelled().is_err());
    }

    #[test]
    fn test_cancel_on_idle_package_reports_idle() {
        let registry = PackageLockRegistry::new();
        assert!(!registry.request_cancel(Uuid::new_v4()));
    }
}
