//! Invalidation rounding.
//!
//! The CO5300 only takes writes that line up with its tile grid, so every
//! area the renderer invalidates is grown to whole `A x A` tiles before it
//! is rendered and flushed.

use crate::geometry::Area;

/// Filter the renderer runs on each invalidated area.
pub trait RegionRounder {
    fn round_invalidated_region(&self, area: Area) -> Area;
}

/// Grows areas outward to a multiple of `align`, then clips to the canvas.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TileRounder {
    align: i32,
    width: u16,
    height: u16,
}

impl TileRounder {
    /// `align` must be non-zero (checked by `DisplayConfig::validate`).
    pub const fn new(align: u16, width: u16, height: u16) -> Self {
        Self {
            align: align as i32,
            width,
            height,
        }
    }

    #[inline]
    fn floor(&self, v: i32) -> i32 {
        v - v.rem_euclid(self.align)
    }

    #[inline]
    fn ceil_last(&self, v: i32) -> i32 {
        v + (self.align - 1 - v.rem_euclid(self.align))
    }
}

impl RegionRounder for TileRounder {
    fn round_invalidated_region(&self, area: Area) -> Area {
        if area.is_empty() {
            return area;
        }
        let grown = Area::new(
            self.floor(area.x1),
            self.floor(area.y1),
            self.ceil_last(area.x2),
            self.ceil_last(area.y2),
        );
        match grown.clamp_to(self.width, self.height) {
            Some(a) => a,
            // Entirely off-canvas: nothing left to repaint.
            None => Area::new(0, 0, -1, -1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const W: u16 = 456;
    const H: u16 = 280;

    fn rounder() -> TileRounder {
        TileRounder::new(8, W, H)
    }

    fn random_area(rng: &mut StdRng) -> Area {
        let x1 = rng.gen_range(0..W as i32);
        let y1 = rng.gen_range(0..H as i32);
        let x2 = rng.gen_range(x1..W as i32);
        let y2 = rng.gen_range(y1..H as i32);
        Area::new(x1, y1, x2, y2)
    }

    #[test]
    fn test_rounds_outward_to_tiles() {
        let r = rounder().round_invalidated_region(Area::new(13, 5, 20, 9));
        assert_eq!(r, Area::new(8, 0, 23, 15));
    }

    #[test]
    fn test_clamps_to_canvas() {
        let r = TileRounder::new(8, 450, 277).round_invalidated_region(Area::new(447, 270, 449, 276));
        assert_eq!(r, Area::new(440, 264, 449, 276));
    }

    #[test]
    fn test_negative_coordinates() {
        let r = rounder().round_invalidated_region(Area::new(-3, -9, 2, 2));
        assert_eq!(r, Area::new(0, 0, 7, 7));
    }

    #[test]
    fn test_empty_stays_empty() {
        let empty = Area::new(16, 16, 15, 20);
        assert!(rounder().round_invalidated_region(empty).is_empty());
        assert!(rounder()
            .round_invalidated_region(Area::new(900, 900, 910, 910))
            .is_empty());
    }

    #[test]
    fn test_idempotent_and_enclosing() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let r = rounder();
        for _ in 0..2000 {
            let a = random_area(&mut rng);
            let once = r.round_invalidated_region(a);
            assert_eq!(r.round_invalidated_region(once), once, "{a:?}");
            assert!(once.encloses(&a), "{once:?} does not cover {a:?}");
        }
    }

    #[test]
    fn test_edges_are_aligned() {
        let mut rng = StdRng::seed_from_u64(42);
        let r = rounder();
        for _ in 0..2000 {
            let once = r.round_invalidated_region(random_area(&mut rng));
            assert_eq!(once.x1 % 8, 0);
            assert_eq!(once.y1 % 8, 0);
            // 456 and 280 are both multiples of 8, so clamping keeps alignment
            assert_eq!((once.x2 + 1) % 8, 0);
            assert_eq!((once.y2 + 1) % 8, 0);
        }
    }
}
