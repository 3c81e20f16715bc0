//! FrameTransport trait - image source abstraction
//!
//! The transport owns its own delivery thread(s). The bridge only hands it a
//! callback and never assumes anything about the thread that invokes it.

use std::fmt;
use std::sync::Arc;

use crate::{ContractError, Timestamp};

/// Frame delivery callback
///
/// Invoked once per arriving image with the raw pixel bytes and the capture
/// time. The slice is only valid for the duration of the call.
pub type FrameCallback = Arc<dyn Fn(&[u8], Timestamp) + Send + Sync>;

/// Handle of an open subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Push-based image source
///
/// # Example
///
/// ```ignore
/// let id = transport.subscribe("~/camera/image", Arc::new(|bytes, ts| {
///     println!("{} bytes at {:?}", bytes.len(), ts);
/// }))?;
/// // ...
/// transport.unsubscribe(id);
/// ```
pub trait FrameTransport: Send + Sync {
    /// Open a subscription on `locator`; `callback` fires for every frame
    fn subscribe(
        &self,
        locator: &str,
        callback: FrameCallback,
    ) -> Result<SubscriptionId, ContractError>;

    /// Close a subscription
    ///
    /// Unknown or already-closed handles are ignored. A callback already in
    /// flight may still complete after this returns.
    fn unsubscribe(&self, id: SubscriptionId);
}
