//! # BULWARK
//!
//! The authoritative simulation core of the arena server.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        ArenaServer (tick)                        │
//! │                                                                  │
//! │  input queue ─> AI ─> movement ─> broad phase ─> narrow phase    │
//! │       │                                              │           │
//! │       │          hooks: weapons, behaviors,          │           │
//! │       │            scheduled actions, lifecycle <────┘           │
//! │       │                        │                                 │
//! │       │                      purge                               │
//! │       │                        │                                 │
//! │       └── per-client delta encode ──> frames ──> transport       │
//! │                                │                                 │
//! │                        clear dirty bits                          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One thread owns the world; the command channel is the only way in and
//! the frame vec the only way out. See `bulwark_core` for the entity
//! data model and `bulwark_net` for the delta frame encoding.

pub mod ai;
pub mod behavior;
pub mod config;
pub mod directory;
pub mod error;
pub mod game_loop;
pub mod physics;
pub mod spatial;
pub mod weapon;
pub mod world;

pub use config::ServerConfig;
pub use error::{SimError, SimResult};
pub use game_loop::{run_arena_loop, ArenaServer, ClientCommand, ScheduledAction, TickLoop};
pub use world::World;

// Re-export the layered crates the way downstream code consumes them.
pub use bulwark_core as core;
pub use bulwark_net as net;
pub use bulwark_shared as shared;
