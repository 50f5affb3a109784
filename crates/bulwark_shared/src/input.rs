//! The uniform input contract.
//!
//! Every controllable entity consumes one [`InputState`] per tick. The
//! state is produced either by decoding a client's input packet or by the
//! AI target-selection pass; consumers cannot tell the difference, and must
//! not try to.

use crate::math::Vec2;
use serde::{Deserialize, Serialize};

/// Identifies a connected client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u32);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// One tick's worth of intent for a single entity.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InputState {
    /// Desired movement direction. Not necessarily normalized; the
    /// integrator normalizes before applying acceleration.
    pub movement: Vec2,
    /// Aim point in world coordinates.
    pub aim: Vec2,
    /// Action flags, see the `FLAG_*` constants.
    pub flags: u16,
}

impl InputState {
    /// Flag: primary fire held.
    pub const FLAG_FIRE: u16 = 1 << 0;
    /// Flag: repel / secondary held.
    pub const FLAG_REPEL: u16 = 1 << 1;

    /// Creates an idle input: no movement, aim straight ahead, no flags.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            movement: Vec2::ZERO,
            aim: Vec2::ZERO,
            flags: 0,
        }
    }

    /// Returns true if the primary fire flag is set.
    #[inline]
    #[must_use]
    pub const fn is_firing(&self) -> bool {
        self.flags & Self::FLAG_FIRE != 0
    }

    /// Returns true if the repel flag is set.
    #[inline]
    #[must_use]
    pub const fn is_repelling(&self) -> bool {
        self.flags & Self::FLAG_REPEL != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_flags() {
        let mut input = InputState::idle();
        assert!(!input.is_firing());

        input.flags |= InputState::FLAG_FIRE;
        assert!(input.is_firing());
        assert!(!input.is_repelling());
    }
}
