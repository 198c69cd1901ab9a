//! Physics integration and platform collision
//!
//! Platforms are one-way: a body only lands when it is falling and its
//! pre-step bottom edge was at (or within tolerance of) the platform top.
//! The pre-step edge is back-computed from the post-move position and the
//! current vertical velocity, so very fast bodies can tunnel.

use super::geometry::Platform;
use super::state::Body;
use crate::consts::CANVAS_WIDTH;

/// Advance position by velocity, then apply gravity to vertical velocity
#[inline]
pub fn integrate(body: &mut Body, gravity: f32) {
    body.pos += body.vel;
    body.vel.y += gravity;
}

/// Resolve a landing against the first qualifying platform
///
/// Returns true when the body ended the step standing on a platform.
pub fn resolve_landing(body: &mut Body, platforms: &[Platform], tolerance: f32) -> bool {
    let mut landed = false;
    for plat in platforms {
        if !body.rect().overlaps(plat) {
            continue;
        }
        let trailing_bottom = body.pos.y + body.height - body.vel.y;
        if body.vel.y > 0.0 && trailing_bottom <= plat.y + tolerance {
            body.pos.y = plat.y - body.height;
            body.vel.y = 0.0;
            landed = true;
        }
    }
    landed
}

/// Keep a body inside the horizontal playfield; returns true if clamped
pub fn clamp_to_world(body: &mut Body) -> bool {
    let max_x = CANVAS_WIDTH - body.width;
    if body.pos.x < 0.0 {
        body.pos.x = 0.0;
        true
    } else if body.pos.x > max_x {
        body.pos.x = max_x;
        true
    } else {
        false
    }
}

/// Whether a body has reached either side wall
#[inline]
pub fn touches_side_wall(body: &Body) -> bool {
    body.pos.x < 0.0 || body.pos.x > CANVAS_WIDTH - body.width
}

/// Multiplicative horizontal decay (no hard stop)
#[inline]
pub fn apply_friction(body: &mut Body, factor: f32) {
    body.vel.x *= factor;
}
