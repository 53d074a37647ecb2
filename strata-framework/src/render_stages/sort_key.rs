#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The packed, caller-defined part of a `SortKey`. See `SortKeyLayout` for how the bits are laid
/// out by the built-in `SortMode`s.
pub type SortKeyValue = u64;

/// Orders the render nodes of a single view/stage pair. `value` is compared first, and ties are
/// broken by `stable_index` so that the result is deterministic even with an unstable sort.
/// `index` points back at the render node the key was generated for and is never compared.
///
/// Example: https://web.archive.org/web/20210110113523/https://realtimecollisiondetection.net/blog/?p=86
#[derive(Copy, Clone, Debug, Default)]
pub struct SortKey {
    pub value: SortKeyValue,
    pub index: i32,
    pub stable_index: i32,
}

impl SortKey {
    pub fn new(
        value: SortKeyValue,
        index: i32,
        stable_index: i32,
    ) -> Self {
        SortKey {
            value,
            index,
            stable_index,
        }
    }
}

impl PartialEq for SortKey {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.value == other.value && self.stable_index == other.stable_index
    }
}

impl Eq for SortKey {}

impl Ord for SortKey {
    #[inline(always)]
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        self.value
            .cmp(&other.value)
            .then(self.stable_index.cmp(&other.stable_index))
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub const SORT_KEY_RENDERER_ID_POSITION: u32 = 56;
pub const SORT_KEY_DISTANCE_BITS: u32 = 16;
pub const SORT_KEY_STATE_BITS: u32 = 32;

const SORT_KEY_DISTANCE_MASK: u64 = (1 << SORT_KEY_DISTANCE_BITS) - 1;
const SORT_KEY_STATE_MASK: u64 = (1 << SORT_KEY_STATE_BITS) - 1;

/// The single place that decides how a `SortKeyValue` is packed:
///
/// ```text
/// bits 56..64   renderer id (the render object type's sort id)
/// 16 bits       quantized view distance, at `distance_position`
/// 32 bits       object state bits (material/pipeline hash), at `state_position`
/// ```
///
/// Because the renderer id is always the most significant field, nodes of the same object type
/// stay grouped together in every stage.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SortKeyLayout {
    pub distance_position: u32,
    pub state_position: u32,
    pub reverse_distance: bool,
}

impl SortKeyLayout {
    pub const FRONT_TO_BACK: SortKeyLayout = SortKeyLayout {
        distance_position: 32,
        state_position: 0,
        reverse_distance: false,
    };

    pub const BACK_TO_FRONT: SortKeyLayout = SortKeyLayout {
        distance_position: 32,
        state_position: 0,
        reverse_distance: true,
    };

    pub const STATE_CHANGE: SortKeyLayout = SortKeyLayout {
        distance_position: 8,
        state_position: 24,
        reverse_distance: false,
    };

    pub fn pack(
        &self,
        renderer_id: u8,
        distance: f32,
        state: u32,
    ) -> SortKeyValue {
        let mut distance_bits = quantize_distance(distance) as u64;
        if self.reverse_distance {
            distance_bits = !distance_bits & SORT_KEY_DISTANCE_MASK;
        }

        ((renderer_id as u64) << SORT_KEY_RENDERER_ID_POSITION)
            | (distance_bits << self.distance_position)
            | ((state as u64 & SORT_KEY_STATE_MASK) << self.state_position)
    }
}

/// Maps a float onto 16 bits while preserving its ordering. The float bits are first made
/// lexicographically comparable (negative values flipped, positive values get the sign bit set)
/// and then the top 16 bits are kept.
pub fn quantize_distance(distance: f32) -> u16 {
    let bits = distance.to_bits();
    let ordered = if (bits as i32) < 0 {
        !bits
    } else {
        bits | 0x8000_0000
    };

    (ordered >> (32 - SORT_KEY_DISTANCE_BITS)) as u16
}

/// How the render nodes of a stage are ordered. This is usually one of the following:
/// 1. unsorted (insertion order)
/// 2. by state, to minimize pipeline changes
/// 3. front-to-back, to get early depth rejection
/// 4. back-to-front, required for blending
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum SortMode {
    None,
    StateChange,
    FrontToBack,
    BackToFront,
}

impl Default for SortMode {
    fn default() -> Self {
        SortMode::None
    }
}

impl SortMode {
    pub fn layout(&self) -> Option<SortKeyLayout> {
        match self {
            SortMode::None => None,
            SortMode::StateChange => Some(SortKeyLayout::STATE_CHANGE),
            SortMode::FrontToBack => Some(SortKeyLayout::FRONT_TO_BACK),
            SortMode::BackToFront => Some(SortKeyLayout::BACK_TO_FRONT),
        }
    }

    pub fn sort_key_value(
        &self,
        renderer_id: u8,
        distance: f32,
        state: u32,
    ) -> SortKeyValue {
        self.layout()
            .map(|layout| layout.pack(renderer_id, distance, state))
            .unwrap_or(0)
    }
}
