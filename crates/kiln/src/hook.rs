//! Per-component hooks
//!
//! A component may ship custom behavior for any of `get`, `put` and `del`.
//! Each method returns `None` when the hook does not implement that
//! operation, in which case the default behavior runs instead.

use crate::data::ComponentData;
use futures::future::BoxFuture;
use serde_json::Value;

/// Error type hooks report; treated as opaque upstream failures
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

pub type HookResult<T> = std::result::Result<T, HookError>;

/// Future returned by a hook operation
pub type HookFuture<'a, T> = BoxFuture<'a, HookResult<T>>;

/// Custom behavior attached to a component.
///
/// `get` and `put` hand back raw JSON. Anything other than a JSON object is
/// a contract violation and is rejected by the caller.
pub trait ComponentHook: Send + Sync {
    /// Produce the component's data instead of reading it from the store
    fn get<'a>(&'a self, _reference: &'a str) -> Option<HookFuture<'a, Value>> {
        None
    }

    /// Transform data before it is persisted
    fn put<'a>(
        &'a self,
        _reference: &'a str,
        _data: ComponentData,
    ) -> Option<HookFuture<'a, Value>> {
        None
    }

    /// Tear down before the component's key is deleted.
    ///
    /// `existing` is `None` when the store had no entry.
    fn del<'a>(
        &'a self,
        _reference: &'a str,
        _existing: Option<ComponentData>,
    ) -> Option<HookFuture<'a, ()>> {
        None
    }
}
