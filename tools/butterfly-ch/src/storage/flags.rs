//! Edge flags: direction bits plus an optional speed
//!
//! Layout of the 32-bit flags word:
//! - bit 0: forward (node A → node B as seen from the anchor node)
//! - bit 1: backward
//! - bits 8..16: speed in km/h (0 = unknown)

use serde::{Deserialize, Serialize};

const FORWARD: u32 = 0b01;
const BACKWARD: u32 = 0b10;
const DIRECTION_MASK: u32 = FORWARD | BACKWARD;
const SPEED_SHIFT: u32 = 8;
const SPEED_MASK: u32 = 0xFF << SPEED_SHIFT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EdgeFlags(u32);

impl EdgeFlags {
    pub const fn forward() -> Self {
        Self(FORWARD)
    }

    pub const fn backward() -> Self {
        Self(BACKWARD)
    }

    pub const fn both() -> Self {
        Self(FORWARD | BACKWARD)
    }

    /// One-way (`forward`) or two-way flags
    pub const fn directed(both_directions: bool) -> Self {
        if both_directions {
            Self::both()
        } else {
            Self::forward()
        }
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_forward(self) -> bool {
        self.0 & FORWARD != 0
    }

    #[inline]
    pub const fn is_backward(self) -> bool {
        self.0 & BACKWARD != 0
    }

    #[inline]
    pub const fn is_both(self) -> bool {
        self.0 & DIRECTION_MASK == DIRECTION_MASK
    }

    /// Same edge seen from the other endpoint
    #[inline]
    pub const fn swapped(self) -> Self {
        let dir = self.0 & DIRECTION_MASK;
        let swapped = ((dir & FORWARD) << 1) | ((dir & BACKWARD) >> 1);
        Self((self.0 & !DIRECTION_MASK) | swapped)
    }

    /// Direction bits only, speed stripped
    pub const fn direction(self) -> Self {
        Self(self.0 & DIRECTION_MASK)
    }

    pub const fn speed_kmh(self) -> u32 {
        (self.0 & SPEED_MASK) >> SPEED_SHIFT
    }

    pub fn with_speed(self, kmh: u32) -> Self {
        let kmh = kmh.min(0xFF);
        Self((self.0 & !SPEED_MASK) | (kmh << SPEED_SHIFT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_one_way() {
        let f = EdgeFlags::forward().with_speed(80);
        let s = f.swapped();
        assert!(!s.is_forward());
        assert!(s.is_backward());
        assert_eq!(s.speed_kmh(), 80);
        assert_eq!(s.swapped(), f);
    }

    #[test]
    fn test_swap_both_is_identity() {
        assert_eq!(EdgeFlags::both().swapped(), EdgeFlags::both());
    }

    #[test]
    fn test_speed_is_clamped() {
        assert_eq!(EdgeFlags::both().with_speed(1000).speed_kmh(), 255);
        assert_eq!(EdgeFlags::both().with_speed(30).direction(), EdgeFlags::both());
    }
}
