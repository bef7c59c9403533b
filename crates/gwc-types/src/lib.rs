//! Shared types, error types, and wire formats for the gateway console
//! authorization core

pub mod errors;
pub mod provider;
pub mod wire;

pub use errors::{AuthError, AuthResult};
pub use provider::{FlowKind, Provider};
pub use wire::{
    CallbackMessage, CallbackStatus, CancelResponse, FlowStatus, FlowStatusResponse,
    StartFlowRequest, StartFlowResponse, StartStatus, CALLBACK_MESSAGE_TYPE,
};
