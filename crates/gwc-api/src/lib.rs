//! Management API client for authorization flows
//!
//! Exposes the remote flow service contract as a trait (`FlowService`) and an
//! HTTP implementation over the gateway's management REST API:
//!
//! - `POST /oauth/start`: begin a flow for a provider
//! - `GET /oauth/status/{state}`: poll a flow by correlation id
//! - `POST /oauth/cancel/{state}`: best-effort cancellation

pub mod client;
pub mod config;

pub use client::{FlowService, HttpFlowService};
pub use config::ApiConfig;
