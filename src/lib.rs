//! Frostbite - a two-player snowball platformer core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (physics, AI, combat, rounds)
//! - `net`: Co-op peer protocol (messages, mailbox, session roles)
//! - `director`: External tuning/coach service with fixed fallbacks
//! - `driver`: Fixed-step loop tying the above together
//! - `settings`: Runtime configuration

pub mod director;
pub mod driver;
pub mod net;
pub mod settings;
pub mod sim;

pub use director::DirectorConfig;
pub use driver::{GameLoop, LoopEvent};
pub use settings::Settings;

/// Game configuration constants (all velocities are per tick)
pub mod consts {
    /// Fixed simulation timestep (one tick per 60 Hz frame)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 4;

    /// Playfield dimensions
    pub const CANVAS_WIDTH: f32 = 1280.0;
    pub const CANVAS_HEIGHT: f32 = 720.0;

    /// Gravity applied to players and enemies
    pub const GRAVITY: f32 = 0.5;
    pub const JUMP_FORCE: f32 = -15.0;
    pub const WALK_SPEED: f32 = 4.0;
    pub const FAST_WALK_SPEED: f32 = 7.0;
    /// Horizontal decay when no direction is held
    pub const FRICTION: f32 = 0.85;

    /// Player defaults
    pub const PLAYER_WIDTH: f32 = 40.0;
    pub const PLAYER_HEIGHT: f32 = 58.0;
    pub const PLAYER_LIVES: u32 = 3;
    pub const PLAYER_HEALTH: i32 = 100;
    pub const PLAYER_SNOWBALLS: u32 = 10;
    /// Spawn points by player slot
    pub const SPAWN_POINTS: [(f32, f32); 2] = [(100.0, 550.0), (700.0, 550.0)];
    /// Where eliminated players are parked
    pub const DEAD_PARK: (f32, f32) = (-1000.0, -1000.0);

    /// Landing tolerance (pre-step bottom edge vs platform top)
    pub const PLAYER_LAND_TOLERANCE: f32 = 15.0;
    pub const ENEMY_LAND_TOLERANCE: f32 = 20.0;

    /// Snowballs
    pub const SNOWBALL_SPEED: f32 = 8.0;
    pub const FAST_SNOWBALL_SPEED: f32 = 14.0;
    pub const SNOWBALL_SIZE: f32 = 18.0;
    pub const HEAVY_SNOWBALL_SIZE: f32 = 36.0;
    pub const MAX_SHOTS: usize = 8;
    pub const MAX_SHOTS_RAPID: usize = 15;
    /// Projectiles survive this far outside the canvas
    pub const PROJECTILE_MARGIN: f32 = 100.0;

    /// Standard enemies
    pub const ENEMY_SIZE: f32 = 44.0;
    pub const ENEMY_HP: i32 = 100;
    pub const ENEMY_BASE_SPEED: f32 = 1.5;
    pub const ENEMY_SPEED_PER_ROUND: f32 = 0.3;
    pub const HOP_CHANCE: f64 = 0.02;
    pub const HOP_FORCE: f32 = -8.0;
    pub const HOP_FORCE_PER_ROUND: f32 = -0.2;
    /// Drop-hunt hysteresis
    pub const DROP_ENTER_GAP: f32 = 60.0;
    pub const DROP_EXIT_GAP: f32 = 10.0;

    /// Freeze mechanics
    pub const FREEZE_THRESHOLD: f32 = 100.0;
    pub const FREEZE_PER_HIT: f32 = 35.0;
    pub const FREEZE_PER_HEAVY_HIT: f32 = 50.0;
    pub const THAW_TICKS: u32 = 300;
    pub const KICK_SPEED: f32 = 18.0;
    pub const KICK_LIFT: f32 = -6.0;
    pub const CHAIN_TRANSFER: f32 = 0.95;
    pub const CHAIN_LIFT: f32 = -6.0;
    pub const CHAIN_BONUS: u64 = 750;
    /// A rolling ball slower than this shatters
    pub const ROLL_SHATTER_SPEED: f32 = 0.8;

    /// Boss
    pub const BOSS_ROUND: u32 = 10;
    pub const BOSS_WIDTH: f32 = 140.0;
    pub const BOSS_HEIGHT: f32 = 180.0;
    pub const BOSS_HP: i32 = 3000;
    pub const BOSS_SPAWN_Y: f32 = 100.0;
    pub const BOSS_SPEED: f32 = 3.5;
    pub const BOSS_LEAP_CHANCE: f64 = 0.015;
    pub const BOSS_LEAP_FORCE: f32 = -18.0;
    pub const BOSS_SHOT_CHANCE: f64 = 0.03;
    pub const BOSS_SHOT_SPEED: f32 = 6.0;
    pub const BOSS_SHOT_SPREAD: f32 = 4.0;
    pub const BOSS_SHOT_SIZE: f32 = 30.0;
    pub const BOSS_FREEZE_PER_HIT: f32 = 4.0;
    pub const BOSS_FREEZE_PER_HEAVY_HIT: f32 = 10.0;
    pub const BOSS_THAW_TICKS: u32 = 400;
    pub const BOSS_DAMAGE_PER_HIT: i32 = 20;

    /// Spawning
    pub const SAFE_SPAWN_DISTANCE: f32 = 200.0;
    pub const SPAWN_ATTEMPTS: u32 = 10;
    pub const MAX_ENEMIES: u32 = 8;
    pub const SPAWN_MIN_X: f32 = 100.0;
    pub const SPAWN_MIN_Y: f32 = 50.0;
    pub const SPAWN_BAND_HEIGHT: f32 = 400.0;
    pub const LAYOUT_JITTER_X: f32 = 20.0;
    pub const LAYOUT_JITTER_W: f32 = 10.0;

    /// Power-ups
    pub const POWERUP_SIZE: f32 = 32.0;
    pub const POWERUP_GRAVITY: f32 = 0.2;
    pub const POWERUP_LIFT: f32 = -7.0;
    pub const POWERUP_TTL: f32 = 12.0;
    pub const POWERUP_DROP_CHANCE: f64 = 0.7;
    pub const POWERUP_BONUS: u64 = 500;

    /// Particles
    pub const PARTICLE_DECAY: f32 = 0.016;
    pub const MAX_PARTICLES: usize = 512;
}
