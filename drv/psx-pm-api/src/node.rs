// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Platform node-id encoding.
//!
//! ```text
//!  31      26 25     20 19     14 13               0
//! +----------+---------+---------+------------------+
//! |  class   | subclass|  type   |      index       |
//! +----------+---------+---------+------------------+
//! ```

pub const CLASS_SHIFT: u32 = 26;
pub const SUBCLASS_SHIFT: u32 = 20;
pub const TYPE_SHIFT: u32 = 14;

const FIELD_MASK: u32 = 0x3f;
const INDEX_MASK: u32 = 0x3fff;

pub const CLASS_POWER: u32 = 0x4;
pub const CLASS_DEVICE: u32 = 0x6;

pub const SUBCLASS_CORE: u32 = 0x1;
pub const SUBCLASS_ISLAND: u32 = 0x2;

pub const TYPE_APU: u32 = 0x3;
pub const TYPE_RPU: u32 = 0x4;

pub const TYPE_TCM: u32 = 0x1;
pub const TYPE_OCM: u32 = 0x2;
pub const TYPE_GEM: u32 = 0x3;

pub const fn node_id(class: u32, subclass: u32, ty: u32, index: u32) -> u32 {
    ((class & FIELD_MASK) << CLASS_SHIFT)
        | ((subclass & FIELD_MASK) << SUBCLASS_SHIFT)
        | ((ty & FIELD_MASK) << TYPE_SHIFT)
        | (index & INDEX_MASK)
}

pub const fn class(id: u32) -> u32 {
    (id >> CLASS_SHIFT) & FIELD_MASK
}

pub const fn subclass(id: u32) -> u32 {
    (id >> SUBCLASS_SHIFT) & FIELD_MASK
}

pub const fn node_type(id: u32) -> u32 {
    (id >> TYPE_SHIFT) & FIELD_MASK
}

pub const fn index(id: u32) -> u32 {
    id & INDEX_MASK
}

/// A run of consecutive enum positions sharing one node type.
pub(crate) struct Span {
    pub ty: u32,
    pub index_base: u32,
    pub first: usize,
    pub len: usize,
}

pub(crate) fn decode(
    id: u32,
    class: u32,
    subclass: u32,
    spans: &[Span],
) -> Option<usize> {
    if self::class(id) != class || self::subclass(id) != subclass {
        return None;
    }
    let span = spans.iter().find(|s| s.ty == node_type(id))?;
    let offset = index(id).checked_sub(span.index_base)? as usize;
    (offset < span.len).then_some(span.first + offset)
}

pub(crate) fn encode(
    position: usize,
    class: u32,
    subclass: u32,
    spans: &[Span],
) -> u32 {
    // Spans cover every position; the const assertions next to the spans
    // keep it that way.
    let (ty, index) = spans
        .iter()
        .find(|s| (s.first..s.first + s.len).contains(&position))
        .map(|s| (s.ty, s.index_base + (position - s.first) as u32))
        .unwrap_or((0, 0));
    node_id(class, subclass, ty, index)
}
