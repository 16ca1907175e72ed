//! Ownership-tagged wrapper for resources that cross the engine boundary.
//!
//! A [`NativeBuffer`] owns exactly one resource (a session, a tensor value, a
//! packed scratch matrix) and records whether it is still live. It is neither
//! `Clone` nor `Copy`, so a resource has one owner and is freed once: either by
//! an explicit [`NativeBuffer::release`] or when the buffer is dropped.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use crate::InferenceError;

static REDUNDANT_RELEASES: AtomicU64 = AtomicU64::new(0);

/// Number of release calls in this process that found the handle already released.
///
/// A non-zero value almost always points at a caller that releases the same
/// tensor or model twice.
pub fn redundant_releases() -> u64 {
    REDUNDANT_RELEASES.load(Ordering::Relaxed)
}

/// Which side of the boundary allocated the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// Allocated by Rust code (input tensors, scratch buffers).
    Managed,
    /// Allocated by the inference engine (sessions, inference outputs).
    Native,
}

/// A single owned resource with an explicit, idempotent release.
pub struct NativeBuffer<T> {
    value: Option<T>,
    owner: Owner,
    kind: &'static str,
}

impl<T> NativeBuffer<T> {
    /// Wraps a resource allocated on the Rust side.
    pub fn managed(kind: &'static str, value: T) -> Self {
        Self {
            value: Some(value),
            owner: Owner::Managed,
            kind,
        }
    }

    /// Wraps a resource allocated by the engine.
    pub fn native(kind: &'static str, value: T) -> Self {
        Self {
            value: Some(value),
            owner: Owner::Native,
            kind,
        }
    }

    /// Runs `f` on a managed resource and releases it before returning.
    ///
    /// The resource is also released if `f` panics.
    pub fn scoped<R>(kind: &'static str, value: T, f: impl FnOnce(&T) -> R) -> Result<R, InferenceError> {
        let mut buffer = Self::managed(kind, value);
        let result = f(buffer.get()?);
        buffer.release();
        Ok(result)
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Short resource name used in errors and logs ("tensor", "session", ...).
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn is_released(&self) -> bool {
        self.value.is_none()
    }

    /// Borrow the resource, failing if it has been released.
    pub fn get(&self) -> Result<&T, InferenceError> {
        self.value
            .as_ref()
            .ok_or(InferenceError::UseAfterRelease(self.kind))
    }

    /// Mutably borrow the resource, failing if it has been released.
    pub fn get_mut(&mut self) -> Result<&mut T, InferenceError> {
        self.value
            .as_mut()
            .ok_or(InferenceError::UseAfterRelease(self.kind))
    }

    /// Frees the resource.
    ///
    /// Returns `true` if this call freed it. Releasing an already released
    /// buffer is a no-op that is logged and counted.
    pub fn release(&mut self) -> bool {
        match self.value.take() {
            Some(value) => {
                drop(value);
                true
            }
            None => {
                REDUNDANT_RELEASES.fetch_add(1, Ordering::Relaxed);
                warn!("{} released more than once", self.kind);
                false
            }
        }
    }
}

impl<T> fmt::Debug for NativeBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBuffer")
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .field("released", &self.is_released())
            .finish()
    }
}
