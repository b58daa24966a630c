//! Raw global tile id layout.
//!
//! Tile layers store one `u32` per cell. The top three bits carry flip flags,
//! the remaining bits the global tile id; `0` is the empty cell.

pub const FLIP_H: u32 = 0x8000_0000; // bit 31
pub const FLIP_V: u32 = 0x4000_0000; // bit 30
pub const FLIP_D: u32 = 0x2000_0000; // bit 29
pub const GID_MASK: u32 = 0x1FFF_FFFF;

/// The empty-cell sentinel.
pub const EMPTY_GID: u32 = 0;

/// Pack a global id and its flip flags into a raw cell value.
#[inline]
pub fn encode(gid: u32, flip_h: bool, flip_v: bool, flip_d: bool) -> u32 {
    let mut raw = gid & GID_MASK;
    if flip_h {
        raw |= FLIP_H;
    }
    if flip_v {
        raw |= FLIP_V;
    }
    if flip_d {
        raw |= FLIP_D;
    }
    raw
}
