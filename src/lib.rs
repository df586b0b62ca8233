//! Host-testable core of the ble-arbiter firmware.
//!
//! Everything here is `no_std`, allocation-free and independent of the
//! radio stack: the arbitration state machine, the central-role link
//! manager (behind the [`link::CentralTransport`] seam), connection
//! debouncing and notification framing.
//!
//! Usage: `cargo test --lib` / `cargo test --test integration`
//!
//! The embedded binary (`src/main.rs`, feature `embedded`) wires these
//! pieces to the SoftDevice.

#![cfg_attr(not(test), no_std)]

pub mod arbiter;
pub mod config;
pub mod error;
pub mod link;
pub mod peripheral;

pub use arbiter::{Decision, ModeArbitrator, Role, RoleState, RolesEnabled};
pub use error::{Error, LinkError};
