//! Opaque engine handles and registry tokens.

use std::ffi::c_void;
use std::fmt;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

/// Opaque, non-null reference to an engine-side object (map, camera,
/// navigation controller, search task, resource or draw group).
///
/// The host never dereferences a handle, it only hands it back to the
/// engine. Equality is identity of the address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NativeHandle(NonNull<c_void>);

// SAFETY: a handle is an opaque token owned by the engine. The host only
// passes it back across the boundary and never reads through it.
unsafe impl Send for NativeHandle {}
unsafe impl Sync for NativeHandle {}

impl NativeHandle {
    /// Wrap a raw pointer returned by the engine. Null maps to `None`.
    #[inline]
    pub fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// Build a handle from a plain address (used by in-process engines).
    #[inline]
    pub fn from_addr(addr: usize) -> Option<Self> {
        Self::from_raw(addr as *mut c_void)
    }

    #[inline]
    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }

    #[inline]
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeHandle({:#x})", self.addr())
    }
}

/// Integer token handed to the engine as the user data of a loaded
/// resource. It maps back to a host object through the
/// [`HandleRegistry`](crate::registry::HandleRegistry).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceToken(NonZeroUsize);

impl ResourceToken {
    #[inline]
    pub fn new(value: usize) -> Option<Self> {
        NonZeroUsize::new(value).map(Self)
    }

    /// Recover a token from the user-data pointer the engine passes back.
    #[inline]
    pub fn from_user_data(ptr: *mut c_void) -> Option<Self> {
        Self::new(ptr as usize)
    }

    /// The pointer-sized value transmitted to the engine.
    #[inline]
    pub fn as_user_data(self) -> *mut c_void {
        self.0.get() as *mut c_void
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Debug for ResourceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceToken({})", self.0)
    }
}

impl fmt::Display for ResourceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn test_null_handle_is_rejected() {
        assert!(NativeHandle::from_raw(ptr::null_mut()).is_none());
        assert!(NativeHandle::from_addr(0).is_none());
    }

    #[test]
    fn test_handle_identity() {
        let a = NativeHandle::from_addr(0x1000).unwrap();
        let b = NativeHandle::from_addr(0x1000).unwrap();
        let c = NativeHandle::from_addr(0x2000).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.addr(), 0x1000);
    }

    #[test]
    fn test_token_user_data_round_trip() {
        let token = ResourceToken::new(42).unwrap();
        let ptr = token.as_user_data();
        assert_eq!(ResourceToken::from_user_data(ptr), Some(token));
        assert!(ResourceToken::from_user_data(ptr::null_mut()).is_none());
    }
}
