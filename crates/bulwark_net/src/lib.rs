//! # BULWARK Net
//!
//! Delta replication: once per tick, for every connected client, the
//! [`WireEncoder`] walks the entities inside that client's view and emits
//! an [`UpdateFrame`] containing
//!
//! - a **full snapshot** for every entity the client sees for the first
//!   time, regardless of dirty state,
//! - the **dirty fields only** for entities the client already knows,
//! - a **deletion notice** for every known entity that was destroyed or
//!   left the view.
//!
//! The guarantee, verified in tests: a client is never re-sent a field
//! value it already holds, and applying a frame to the client's cache
//! reproduces the server state for every field that changed.

pub mod encoder;
pub mod frame;
pub mod serialize;

pub use encoder::{ClientView, EncoderStats, WireEncoder};
pub use frame::{CachedEntity, EntityUpdate, GroupDelta, UpdateFrame};
pub use serialize::{decode_frame, encode_frame, FrameError};
