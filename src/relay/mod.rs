//! OAuth token relay
//!
//! Receives the provider redirect on `/callback`, exchanges the code for
//! tokens and parks them under the `state` value until the CLI that started
//! the flow picks them up, exactly once, from `/token/{state}`.

mod controller;
mod error;
mod exchange;
mod router;
mod templates;
pub mod types;

pub use controller::{TOKEN_TTL_SECS, TokenLifecycle};
pub use exchange::HttpTokenExchanger;
pub use router::{RelayState, create_relay_router};
