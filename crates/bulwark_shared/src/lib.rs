//! # BULWARK Shared
//!
//! Types shared between the simulation core, the wire encoder, and the
//! external codec: 2D math, gameplay constants, the immutable definition
//! tables, and the uniform input contract.
//!
//! This crate holds no simulation state and performs no I/O.

pub mod constants;
pub mod defs;
pub mod input;
pub mod math;

pub use input::{ClientId, InputState};
pub use math::Vec2;
