//! Popup and message-channel transport abstraction
//!
//! The OAuth coordinator opens the third-party authorization page in a
//! separate browsing context and waits for a completion signal posted back
//! from it. How the context is opened and how messages are delivered is
//! environment-specific, so both sit behind traits; the coordinator only
//! sees a handle it can close and a channel of inbound [`CallbackMessage`]s.
//!
//! Closure of the popup cannot be observed as an event, so the coordinator
//! polls [`PopupHandle::is_closed`] at a short fixed interval.

use gwc_types::CallbackMessage;
use std::sync::Arc;
use tokio::sync::broadcast;
use url::Url;

/// Handle to an opened browsing context
pub trait PopupHandle: Send + Sync {
    /// Whether the user has closed the context
    fn is_closed(&self) -> bool;

    /// Close the context programmatically; idempotent
    fn close(&self);
}

/// Opens authorization pages and delivers completion signals
pub trait BrowserTransport: Send + Sync {
    /// Open the authorization URL in a new browsing context
    ///
    /// Returns `None` when blocked by the environment; the coordinator
    /// treats that as a fatal start failure.
    fn open(&self, url: &Url) -> Option<Arc<dyn PopupHandle>>;

    /// Subscribe to inbound completion signals
    ///
    /// Every message carries the correlation id of the attempt it belongs
    /// to; subscribers must validate it against their own attempt and ignore
    /// mismatches.
    fn subscribe(&self) -> broadcast::Receiver<CallbackMessage>;
}
