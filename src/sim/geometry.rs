//! Axis-aligned rectangle geometry
//!
//! Everything in the playfield is an unrotated box in screen space
//! (x grows right, y grows down). Overlap is strict on every edge, so
//! boxes that merely touch do not collide.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle (top-left corner + size)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Platforms are plain rectangles; the wire format uses the same field names.
pub type Platform = Rect;

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Build from a top-left position and a size
    #[inline]
    pub fn from_pos_size(pos: Vec2, w: f32, h: f32) -> Self {
        Self::new(pos.x, pos.y, w, h)
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Strict AABB overlap test
    #[inline]
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Grow the rectangle by `margin` on every side
    pub fn expanded(&self, margin: f32) -> Rect {
        Rect::new(
            self.x - margin,
            self.y - margin,
            self.w + margin * 2.0,
            self.h + margin * 2.0,
        )
    }

    /// Whether a point lies strictly inside
    pub fn contains(&self, point: Vec2) -> bool {
        point.x > self.x && point.x < self.right() && point.y > self.y && point.y < self.bottom()
    }
}

/// Unit-or-zero direction of travel along x toward `target`
///
/// Ties resolve to -1, matching how enemies pick a direction when exactly
/// aligned with their target.
#[inline]
pub fn heading_toward(from: f32, target: f32) -> f32 {
    if target - from > 0.0 { 1.0 } else { -1.0 }
}
