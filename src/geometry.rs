//! Inclusive-bounds rectangles in display space.
//!
//! `Area` mirrors what the renderer hands out: `x2`/`y2` are the last
//! column/row that belong to the rectangle. An empty area has
//! `x1 == x2 + 1` (or the same on y).

use embedded_graphics::{
    prelude::{Point, Size},
    primitives::Rectangle,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Area {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Area {
    #[inline]
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Area covering a whole `width` x `height` canvas.
    #[inline]
    pub const fn canvas(width: u16, height: u16) -> Self {
        Self::new(0, 0, width as i32 - 1, height as i32 - 1)
    }

    // Columns covered; zero (or less, for malformed input) when empty.
    #[inline]
    pub const fn width(&self) -> i32 {
        self.x2 - self.x1 + 1
    }

    #[inline]
    pub const fn height(&self) -> i32 {
        self.y2 - self.y1 + 1
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Number of pixels, 0 for empty areas.
    #[inline]
    pub const fn pixel_count(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.width() as usize) * (self.height() as usize)
        }
    }

    #[inline]
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x1 && x <= self.x2 && y >= self.y1 && y <= self.y2
    }

    /// True when `other` lies entirely inside `self`. Empty areas are inside everything.
    pub const fn encloses(&self, other: &Area) -> bool {
        other.is_empty()
            || (other.x1 >= self.x1 && other.y1 >= self.y1 && other.x2 <= self.x2 && other.y2 <= self.y2)
    }

    /// Overlap of two areas, `None` when they do not touch.
    pub fn intersection(&self, other: &Area) -> Option<Area> {
        let a = Area::new(
            self.x1.max(other.x1),
            self.y1.max(other.y1),
            self.x2.min(other.x2),
            self.y2.min(other.y2),
        );
        if a.is_empty() {
            None
        } else {
            Some(a)
        }
    }

    /// Smallest area covering both. Empty inputs are ignored.
    pub fn union(&self, other: &Area) -> Area {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Area::new(
            self.x1.min(other.x1),
            self.y1.min(other.y1),
            self.x2.max(other.x2),
            self.y2.max(other.y2),
        )
    }

    /// Clip to a `width` x `height` canvas.
    #[inline]
    pub fn clamp_to(&self, width: u16, height: u16) -> Option<Area> {
        self.intersection(&Area::canvas(width, height))
    }

    /// Sub-area made of `rows` rows starting `first_row` rows below `y1`.
    pub fn rows(&self, first_row: i32, rows: i32) -> Area {
        let y1 = self.y1 + first_row;
        Area::new(self.x1, y1, self.x2, (y1 + rows - 1).min(self.y2))
    }
}

impl From<Rectangle> for Area {
    fn from(r: Rectangle) -> Self {
        Area::new(
            r.top_left.x,
            r.top_left.y,
            r.top_left.x + r.size.width as i32 - 1,
            r.top_left.y + r.size.height as i32 - 1,
        )
    }
}

impl From<Area> for Rectangle {
    fn from(a: Area) -> Self {
        if a.is_empty() {
            return Rectangle::new(Point::new(a.x1, a.y1), Size::zero());
        }
        Rectangle::new(
            Point::new(a.x1, a.y1),
            Size::new(a.width() as u32, a.height() as u32),
        )
    }
}
