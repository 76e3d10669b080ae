//! Handle registry: integer tokens ↔ host objects.
//!
//! The engine stores a loaded resource's token as opaque user data. While
//! the token is live the registry holds a strong reference to the host
//! object, so the object outlives every engine reference to it. The
//! engine's deleter releases the token exactly once.
//!
//! ```text
//!  load callback ──register(obj)──▸ token ──user data──▸ engine
//!  draw extraction ◂──resolve(token)──┘
//!  deleter ──release(token)──▸ Arc dropped (outside the lock)
//! ```
//!
//! Tokens come from one process-wide counter and are never reused, so a
//! stale token can only ever miss, never alias another object.

use std::any::Any;
use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{BridgeError, Result};
use crate::handle::ResourceToken;

/// Host-side object kept alive for the engine.
pub type HostObject = Arc<dyn Any + Send + Sync>;

static NEXT_TOKEN: AtomicUsize = AtomicUsize::new(1);

fn next_token() -> ResourceToken {
    let value = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    // The counter starts at 1 and would need 2^64 loads to wrap.
    ResourceToken::new(value).unwrap_or_else(|| unreachable!("token counter wrapped"))
}

/// Snapshot of registry counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub live: usize,
    pub registered: u64,
    pub released: u64,
    /// Releases of unknown or already released tokens.
    pub rejected: u64,
}

#[derive(Default)]
struct Counters {
    registered: AtomicU64,
    released: AtomicU64,
    rejected: AtomicU64,
}

/// Per-instance token table.
#[derive(Default)]
pub struct HandleRegistry {
    entries: Mutex<HashMap<ResourceToken, HostObject>>,
    counters: Counters,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ResourceToken, HostObject>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a strong reference to `object` and return a fresh token for it.
    pub fn register(&self, object: HostObject) -> ResourceToken {
        let token = next_token();
        self.lock().insert(token, object);
        self.counters.registered.fetch_add(1, Ordering::Relaxed);
        token
    }

    /// Look up a live token. Ownership does not change.
    pub fn resolve(&self, token: ResourceToken) -> Option<HostObject> {
        self.lock().get(&token).cloned()
    }

    /// Resolve the user-data pointer of a draw record. Null is absent.
    pub fn resolve_raw(&self, user_data: *mut c_void) -> Option<HostObject> {
        ResourceToken::from_user_data(user_data).and_then(|token| self.resolve(token))
    }

    /// Resolve and downcast in one step.
    pub fn resolve_as<T: Any + Send + Sync>(&self, user_data: *mut c_void) -> Option<Arc<T>> {
        self.resolve_raw(user_data)
            .and_then(|object| object.downcast::<T>().ok())
    }

    /// Drop the strong reference held for `token`.
    ///
    /// A second release of the same token is a `Lifecycle` error; the host
    /// object is never dropped twice.
    pub fn release(&self, token: ResourceToken) -> Result<()> {
        let removed = self.lock().remove(&token);
        match removed {
            Some(object) => {
                self.counters.released.fetch_add(1, Ordering::Relaxed);
                drop(object);
                Ok(())
            }
            None => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(BridgeError::Lifecycle(token.get()))
            }
        }
    }

    pub fn contains(&self, token: ResourceToken) -> bool {
        self.lock().contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Release every live entry at teardown. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let drained: Vec<HostObject> = self.lock().drain().map(|(_, object)| object).collect();
        let count = drained.len();
        self.counters
            .released
            .fetch_add(count as u64, Ordering::Relaxed);
        drop(drained);
        count
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            live: self.len(),
            registered: self.counters.registered.load(Ordering::Relaxed),
            released: self.counters.released.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("live", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Payload(u32);

    fn object(value: u32) -> HostObject {
        Arc::new(Payload(value))
    }

    #[test]
    fn test_register_then_resolve() {
        let registry = HandleRegistry::new();
        let o = object(7);
        let token = registry.register(Arc::clone(&o));
        let resolved = registry.resolve(token).unwrap();
        assert!(Arc::ptr_eq(&o, &resolved));
        assert_eq!(resolved.downcast_ref::<Payload>().unwrap().0, 7);
    }

    #[test]
    fn test_release_makes_token_absent() {
        let registry = HandleRegistry::new();
        let token = registry.register(object(1));
        registry.release(token).unwrap();
        assert!(registry.resolve(token).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_double_release_is_lifecycle_error() {
        let registry = HandleRegistry::new();
        let token = registry.register(object(1));
        assert!(registry.release(token).is_ok());
        assert_eq!(
            registry.release(token),
            Err(BridgeError::Lifecycle(token.get()))
        );
        assert_eq!(registry.stats().rejected, 1);
        assert_eq!(registry.stats().released, 1);
    }

    #[test]
    fn test_release_drops_the_host_object() {
        let registry = HandleRegistry::new();
        let o = object(3);
        let weak = Arc::downgrade(&o);
        let token = registry.register(o);
        assert!(weak.upgrade().is_some());
        registry.release(token).unwrap();
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_tokens_are_unique_across_registries() {
        let a = HandleRegistry::new();
        let b = HandleRegistry::new();
        let ta = a.register(object(1));
        let tb = b.register(object(2));
        assert_ne!(ta, tb);
        a.release(ta).unwrap();
        let tc = a.register(object(3));
        assert_ne!(ta, tc);
        assert!(b.resolve(ta).is_none());
    }

    #[test]
    fn test_resolve_raw_and_downcast() {
        let registry = HandleRegistry::new();
        let token = registry.register(object(9));
        let payload = registry
            .resolve_as::<Payload>(token.as_user_data())
            .unwrap();
        assert_eq!(payload.0, 9);
        assert!(registry.resolve_raw(std::ptr::null_mut()).is_none());
        assert!(registry.resolve_as::<String>(token.as_user_data()).is_none());
    }

    #[test]
    fn test_clear_releases_everything() {
        let registry = HandleRegistry::new();
        let tokens: Vec<_> = (0..4).map(|i| registry.register(object(i))).collect();
        assert_eq!(registry.clear(), 4);
        for token in tokens {
            assert!(registry.release(token).is_err());
        }
        let stats = registry.stats();
        assert_eq!(stats.live, 0);
        assert_eq!(stats.registered, 4);
        assert_eq!(stats.released, 4);
        assert_eq!(stats.rejected, 4);
    }
}
