//! OAuth and device-flow authorization coordinators
//!
//! The coordination core of the gateway console's credential management:
//! starting an authorization attempt against the management API, watching it
//! through a popup message channel and/or a status poller, and resolving it
//! to exactly one terminal outcome.
//!
//! # Features
//! - Redirect/popup OAuth coordinator with anti-forgery state validation
//! - Device-code coordinator with server-supplied expiry and retry
//! - Single-fire terminal transitions across racing signals
//! - Authorization URL allow-listing per provider
//! - Error sanitization before anything reaches the UI
//!
//! # Usage Example
//! ```no_run
//! # async fn demo(service: std::sync::Arc<dyn gwc_api::FlowService>,
//! #               transport: std::sync::Arc<dyn gwc_oauth::BrowserTransport>) {
//! use gwc_oauth::OAuthFlowCoordinator;
//! use gwc_types::Provider;
//!
//! let coordinator = OAuthFlowCoordinator::new(service, transport);
//! let mut events = coordinator.subscribe_events();
//! coordinator.start_flow(Provider::Anthropic, None).await.unwrap();
//! let outcome = events.recv().await.unwrap();
//! # let _ = outcome;
//! # }
//! ```

pub mod device;
pub mod events;
pub mod oauth;
pub mod poller;
pub mod registry;
pub mod security;
pub mod transport;

pub use device::{
    DeviceCoordinatorConfig, DeviceFlowCoordinator, DeviceFlowSnapshot, DeviceFlowStatus,
};
pub use events::{FlowEvent, FlowOutcome};
pub use oauth::{OAuthCoordinatorConfig, OAuthFlowCoordinator, OAuthFlowSnapshot};
pub use poller::{PollSignal, StatusPoller};
pub use registry::StateRegistry;
pub use security::{categorize, sanitize_error, validate_auth_url, ErrorCategory};
pub use transport::{BrowserTransport, PopupHandle};
