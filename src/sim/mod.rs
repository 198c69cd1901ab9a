//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (collection order)
//! - No rendering, network or platform dependencies

pub mod collision;
pub mod combat;
pub mod enemy;
pub mod geometry;
pub mod round;
pub mod state;
pub mod tick;

pub use geometry::{Platform, Rect};
pub use state::{
    Abilities, Authority, Body, Control, Enemy, EnemyState, EnemyVariant, Entity, EntityKind,
    GameEvent, GamePhase, Particle, Player, PowerUp, PowerUpKind, Projectile, ProjectileOwner,
    SimulationState, StateView, DEFEAT_REASON, VICTORY_REASON,
};
pub use tick::{TickInput, bot_input, tick};
