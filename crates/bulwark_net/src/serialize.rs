//! # Frame Serialization Scaffold
//!
//! A reference byte layout for [`UpdateFrame`], used by the headless
//! server and the round-trip tests. The production codec owns the real
//! schema and may replace this wholesale; nothing in the simulation
//! depends on the bytes produced here.
//!
//! Layout, all little-endian:
//!
//! ```text
//! u64 tick
//! u32 deletion_count   { u32 index, u32 generation } *
//! u32 update_count     { u32 index, u32 generation, u8 group_count,
//!                        { u8 group_tag, u32 mask, masked fields... } * } *
//! ```
//!
//! Masked fields are written in field-bit order; strings are u16-length
//! prefixed UTF-8.

use crate::frame::{EntityUpdate, GroupDelta, UpdateFrame};
use bulwark_core::fields::{
    BarrelGroup, BarrelValues, GroupId, HealthGroup, HealthValues, NameGroup, NameValues,
    PhysicsGroup, PhysicsValues, PositionGroup, PositionValues, RelationsGroup, RelationsValues,
    StyleGroup, StyleValues,
};
use bulwark_core::EntityId;
use thiserror::Error;

/// Errors produced while decoding a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The buffer ended before the frame did.
    #[error("unexpected end of frame buffer at offset {0}")]
    UnexpectedEof(usize),

    /// An unknown group tag was encountered.
    #[error("unknown group tag {0}")]
    UnknownGroupTag(u8),

    /// A string field was not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidString,
}

// =============================================================================
// Writer
// =============================================================================

struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    fn new() -> Self {
        Self {
            buf: Vec::with_capacity(256),
        }
    }

    #[inline]
    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    #[inline]
    fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_id(&mut self, id: EntityId) {
        self.write_u32(id.index);
        self.write_u32(id.generation);
    }

    fn write_str(&mut self, s: &str) {
        let bytes = s.as_bytes();
        debug_assert!(bytes.len() <= u16::MAX as usize, "name too long for wire");
        self.write_u16(bytes.len() as u16);
        self.buf.extend_from_slice(bytes);
    }
}

/// Encodes a frame into the reference byte layout.
#[must_use]
pub fn encode_frame(frame: &UpdateFrame) -> Vec<u8> {
    let mut w = FrameWriter::new();
    w.write_u64(frame.tick);

    w.write_u32(frame.deletions.len() as u32);
    for &id in &frame.deletions {
        w.write_id(id);
    }

    w.write_u32(frame.updates.len() as u32);
    for update in &frame.updates {
        w.write_id(update.id);
        w.write_u8(update.groups.len() as u8);
        for delta in &update.groups {
            w.write_u8(delta.group_id() as u8);
            w.write_u32(delta.mask());
            write_group_fields(&mut w, delta);
        }
    }

    w.buf
}

fn write_group_fields(w: &mut FrameWriter, delta: &GroupDelta) {
    match delta {
        GroupDelta::Position { mask, values } => {
            if mask & PositionGroup::F_X != 0 {
                w.write_f32(values.x);
            }
            if mask & PositionGroup::F_Y != 0 {
                w.write_f32(values.y);
            }
            if mask & PositionGroup::F_ANGLE != 0 {
                w.write_f32(values.angle);
            }
            if mask & PositionGroup::F_FLAGS != 0 {
                w.write_u8(values.flags);
            }
        }
        GroupDelta::Physics { mask, values } => {
            if mask & PhysicsGroup::F_SIZE != 0 {
                w.write_f32(values.size);
            }
            if mask & PhysicsGroup::F_WIDTH != 0 {
                w.write_f32(values.width);
            }
            if mask & PhysicsGroup::F_SIDES != 0 {
                w.write_u8(values.sides);
            }
            if mask & PhysicsGroup::F_PUSH_FACTOR != 0 {
                w.write_f32(values.push_factor);
            }
            if mask & PhysicsGroup::F_ABSORPTION != 0 {
                w.write_f32(values.absorption_factor);
            }
            if mask & PhysicsGroup::F_FLAGS != 0 {
                w.write_u16(values.flags);
            }
        }
        GroupDelta::Style { mask, values } => {
            if mask & StyleGroup::F_COLOR != 0 {
                w.write_u8(values.color);
            }
            if mask & StyleGroup::F_OPACITY != 0 {
                w.write_f32(values.opacity);
            }
            if mask & StyleGroup::F_FLAGS != 0 {
                w.write_u8(values.flags);
            }
        }
        GroupDelta::Health { mask, values } => {
            if mask & HealthGroup::F_HEALTH != 0 {
                w.write_f32(values.health);
            }
            if mask & HealthGroup::F_MAX_HEALTH != 0 {
                w.write_f32(values.max_health);
            }
            if mask & HealthGroup::F_FLAGS != 0 {
                w.write_u8(values.flags);
            }
        }
        GroupDelta::Relations { mask, values } => {
            if mask & RelationsGroup::F_PARENT != 0 {
                w.write_id(values.parent);
            }
            if mask & RelationsGroup::F_OWNER != 0 {
                w.write_id(values.owner);
            }
            if mask & RelationsGroup::F_TEAM != 0 {
                w.write_id(values.team);
            }
        }
        GroupDelta::Name { mask, values } => {
            if mask & NameGroup::F_NAME != 0 {
                w.write_str(&values.name);
            }
            if mask & NameGroup::F_FLAGS != 0 {
                w.write_u8(values.flags);
            }
        }
        GroupDelta::Barrel { mask, values } => {
            if mask & BarrelGroup::F_RELOAD_TIME != 0 {
                w.write_f32(values.reload_time);
            }
            if mask & BarrelGroup::F_FLAGS != 0 {
                w.write_u8(values.flags);
            }
        }
    }
}

// =============================================================================
// Reader
// =============================================================================

struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FrameError> {
        if self.pos + n > self.buf.len() {
            return Err(FrameError::UnexpectedEof(self.pos));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, FrameError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, FrameError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, FrameError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self) -> Result<u64, FrameError> {
        let b = self.take(8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(b);
        Ok(u64::from_le_bytes(bytes))
    }

    fn read_f32(&mut self) -> Result<f32, FrameError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    fn read_id(&mut self) -> Result<EntityId, FrameError> {
        let index = self.read_u32()?;
        let generation = self.read_u32()?;
        Ok(EntityId::new(index, generation))
    }

    fn read_str(&mut self) -> Result<String, FrameError> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| FrameError::InvalidString)
    }
}

/// Decodes a frame from the reference byte layout.
///
/// # Errors
///
/// Fails on truncated buffers, unknown group tags, and malformed strings.
pub fn decode_frame(bytes: &[u8]) -> Result<UpdateFrame, FrameError> {
    let mut r = FrameReader::new(bytes);
    let tick = r.read_u64()?;

    let deletion_count = r.read_u32()? as usize;
    let mut deletions = Vec::with_capacity(deletion_count.min(1024));
    for _ in 0..deletion_count {
        deletions.push(r.read_id()?);
    }

    let update_count = r.read_u32()? as usize;
    let mut updates = Vec::with_capacity(update_count.min(1024));
    for _ in 0..update_count {
        let id = r.read_id()?;
        let group_count = r.read_u8()? as usize;
        let mut groups = Vec::with_capacity(group_count);
        for _ in 0..group_count {
            let tag = r.read_u8()?;
            let group = GroupId::from_u8(tag).ok_or(FrameError::UnknownGroupTag(tag))?;
            let mask = r.read_u32()?;
            groups.push(read_group_fields(&mut r, group, mask)?);
        }
        updates.push(EntityUpdate { id, groups });
    }

    Ok(UpdateFrame {
        tick,
        deletions,
        updates,
    })
}

fn read_group_fields(
    r: &mut FrameReader<'_>,
    group: GroupId,
    mask: u32,
) -> Result<GroupDelta, FrameError> {
    Ok(match group {
        GroupId::Position => {
            let mut values = PositionValues::default();
            if mask & PositionGroup::F_X != 0 {
                values.x = r.read_f32()?;
            }
            if mask & PositionGroup::F_Y != 0 {
                values.y = r.read_f32()?;
            }
            if mask & PositionGroup::F_ANGLE != 0 {
                values.angle = r.read_f32()?;
            }
            if mask & PositionGroup::F_FLAGS != 0 {
                values.flags = r.read_u8()?;
            }
            GroupDelta::Position { mask, values }
        }
        GroupId::Physics => {
            let mut values = PhysicsValues::default();
            if mask & PhysicsGroup::F_SIZE != 0 {
                values.size = r.read_f32()?;
            }
            if mask & PhysicsGroup::F_WIDTH != 0 {
                values.width = r.read_f32()?;
            }
            if mask & PhysicsGroup::F_SIDES != 0 {
                values.sides = r.read_u8()?;
            }
            if mask & PhysicsGroup::F_PUSH_FACTOR != 0 {
                values.push_factor = r.read_f32()?;
            }
            if mask & PhysicsGroup::F_ABSORPTION != 0 {
                values.absorption_factor = r.read_f32()?;
            }
            if mask & PhysicsGroup::F_FLAGS != 0 {
                values.flags = r.read_u16()?;
            }
            GroupDelta::Physics { mask, values }
        }
        GroupId::Style => {
            let mut values = StyleValues::default();
            if mask & StyleGroup::F_COLOR != 0 {
                values.color = r.read_u8()?;
            }
            if mask & StyleGroup::F_OPACITY != 0 {
                values.opacity = r.read_f32()?;
            }
            if mask & StyleGroup::F_FLAGS != 0 {
                values.flags = r.read_u8()?;
            }
            GroupDelta::Style { mask, values }
        }
        GroupId::Health => {
            let mut values = HealthValues::default();
            if mask & HealthGroup::F_HEALTH != 0 {
                values.health = r.read_f32()?;
            }
            if mask & HealthGroup::F_MAX_HEALTH != 0 {
                values.max_health = r.read_f32()?;
            }
            if mask & HealthGroup::F_FLAGS != 0 {
                values.flags = r.read_u8()?;
            }
            GroupDelta::Health { mask, values }
        }
        GroupId::Relations => {
            let mut values = RelationsValues::default();
            if mask & RelationsGroup::F_PARENT != 0 {
                values.parent = r.read_id()?;
            }
            if mask & RelationsGroup::F_OWNER != 0 {
                values.owner = r.read_id()?;
            }
            if mask & RelationsGroup::F_TEAM != 0 {
                values.team = r.read_id()?;
            }
            GroupDelta::Relations { mask, values }
        }
        GroupId::Name => {
            let mut values = NameValues::default();
            if mask & NameGroup::F_NAME != 0 {
                values.name = r.read_str()?;
            }
            if mask & NameGroup::F_FLAGS != 0 {
                values.flags = r.read_u8()?;
            }
            GroupDelta::Name { mask, values }
        }
        GroupId::Barrel => {
            let mut values = BarrelValues::default();
            if mask & BarrelGroup::F_RELOAD_TIME != 0 {
                values.reload_time = r.read_f32()?;
            }
            if mask & BarrelGroup::F_FLAGS != 0 {
                values.flags = r.read_u8()?;
            }
            GroupDelta::Barrel { mask, values }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> UpdateFrame {
        UpdateFrame {
            tick: 907,
            deletions: vec![EntityId::new(4, 1)],
            updates: vec![
                EntityUpdate {
                    id: EntityId::new(7, 0),
                    groups: vec![
                        GroupDelta::Position {
                            mask: PositionGroup::F_X | PositionGroup::F_ANGLE,
                            values: PositionValues {
                                x: -31.5,
                                y: 0.0,
                                angle: 1.25,
                                flags: 0,
                            },
                        },
                        GroupDelta::Health {
                            mask: HealthGroup::F_HEALTH,
                            values: HealthValues {
                                health: 18.0,
                                max_health: 0.0,
                                flags: 0,
                            },
                        },
                    ],
                },
                EntityUpdate {
                    id: EntityId::new(9, 3),
                    groups: vec![GroupDelta::Name {
                        mask: NameGroup::FULL_MASK,
                        values: NameValues {
                            name: "Sierra".to_owned(),
                            flags: 0,
                        },
                    }],
                },
            ],
        }
    }

    #[test]
    fn test_frame_roundtrip() {
        let frame = sample_frame();
        let bytes = encode_frame(&frame);
        let decoded = decode_frame(&bytes).expect("frame should decode");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_unmasked_fields_decode_to_defaults() {
        // The y field is not masked, so its encoded value is dropped and
        // the decode side leaves the default; receivers keep their cache.
        let frame = sample_frame();
        let bytes = encode_frame(&frame);
        let decoded = decode_frame(&bytes).unwrap();

        let GroupDelta::Position { values, .. } = &decoded.updates[0].groups[0] else {
            panic!("expected position delta");
        };
        assert_eq!(values.x, -31.5);
        assert_eq!(values.y, 0.0);
    }

    #[test]
    fn test_truncated_buffer_fails() {
        let bytes = encode_frame(&sample_frame());
        let err = decode_frame(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, FrameError::UnexpectedEof(_)));
    }

    #[test]
    fn test_empty_frame_roundtrip() {
        let frame = UpdateFrame {
            tick: 1,
            deletions: vec![],
            updates: vec![],
        };
        let bytes = encode_frame(&frame);
        assert_eq!(decode_frame(&bytes).unwrap(), frame);
    }
}
