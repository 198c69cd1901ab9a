//! Game state and core simulation types
//!
//! Every collection here is owned by `SimulationState` and rebuilt by the
//! tick; nothing outside the tick driver mutates it mid-tick.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::geometry::{Platform, Rect};
use crate::consts::*;
use crate::director::DirectorConfig;

/// Current phase of the match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Active gameplay
    Playing,
    /// Simulation frozen until unpaused
    Paused,
    /// Boss round cleared
    Victory,
    /// Every active player is out of lives
    Defeat,
}

impl GamePhase {
    pub fn is_over(&self) -> bool {
        matches!(self, GamePhase::Victory | GamePhase::Defeat)
    }
}

/// Who owns enemy/platform state in this simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Authority {
    /// Single player, owns everything
    Solo,
    /// Co-op host, owns enemies, platforms and rounds
    Host,
    /// Co-op guest, receives enemies, platforms and rounds from the host
    Guest,
}

impl Authority {
    /// Whether this side spawns enemies and advances rounds
    pub fn owns_world(&self) -> bool {
        !matches!(self, Authority::Guest)
    }
}

/// Entity kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Player,
    Enemy,
    Projectile,
    Particle,
    PowerUp,
}

/// Position, velocity and bounding box shared by every moving entity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub pos: Vec2,
    pub vel: Vec2,
    pub width: f32,
    pub height: f32,
}

impl Body {
    pub fn new(pos: Vec2, width: f32, height: f32) -> Self {
        Self {
            pos,
            vel: Vec2::ZERO,
            width,
            height,
        }
    }

    pub fn with_vel(mut self, vel: Vec2) -> Self {
        self.vel = vel;
        self
    }

    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_pos_size(self.pos, self.width, self.height)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.rect().center()
    }

    #[inline]
    pub fn overlaps(&self, other: &Body) -> bool {
        self.rect().overlaps(&other.rect())
    }
}

/// Common read access to entities
pub trait Entity {
    fn id(&self) -> &str;
    fn kind(&self) -> EntityKind;
    fn body(&self) -> &Body;

    fn rect(&self) -> Rect {
        self.body().rect()
    }
}

/// Abilities granted by power-ups (never revoked within a life)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Abilities {
    pub fast_run: bool,
    pub fast_snow: bool,
    pub wide_snow: bool,
}

impl Abilities {
    pub fn grant(&mut self, kind: PowerUpKind) {
        match kind {
            PowerUpKind::FastRun => self.fast_run = true,
            PowerUpKind::FastSnow => self.fast_snow = true,
            PowerUpKind::WideSnow => self.wide_snow = true,
        }
    }
}

/// Whether a player is driven by this process or mirrored from the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Control {
    Local,
    Remote,
}

/// A player character
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    /// Spawn slot (0 = local, 1 = co-op partner)
    pub slot: usize,
    pub control: Control,
    pub body: Body,
    pub is_jumping: bool,
    /// +1 facing right, -1 facing left
    pub facing: f32,
    /// Legacy gate: zero once the player is eliminated
    pub health: i32,
    pub lives: u32,
    /// Display counter only
    pub snowballs: u32,
    pub abilities: Abilities,
}

impl Player {
    pub fn new(slot: usize, control: Control) -> Self {
        let facing = if slot == 0 { 1.0 } else { -1.0 };
        Self {
            id: format!("p{}", slot + 1),
            slot,
            control,
            body: Body::new(Self::spawn_point(slot), PLAYER_WIDTH, PLAYER_HEIGHT),
            is_jumping: false,
            facing,
            health: PLAYER_HEALTH,
            lives: PLAYER_LIVES,
            snowballs: PLAYER_SNOWBALLS,
            abilities: Abilities::default(),
        }
    }

    /// Fixed spawn coordinate for a slot
    pub fn spawn_point(slot: usize) -> Vec2 {
        let (x, y) = SPAWN_POINTS[slot.min(SPAWN_POINTS.len() - 1)];
        Vec2::new(x, y)
    }

    pub fn is_alive(&self) -> bool {
        self.lives > 0
    }

    pub fn is_local(&self) -> bool {
        self.control == Control::Local
    }

    /// Move back to the slot's spawn point with zero velocity
    pub fn respawn(&mut self) {
        self.body.pos = Self::spawn_point(self.slot);
        self.body.vel = Vec2::ZERO;
    }

    /// Out of lives: park off-field and stop simulating
    pub fn eliminate(&mut self) {
        self.health = 0;
        self.body.pos = Vec2::new(DEAD_PARK.0, DEAD_PARK.1);
        self.body.vel = Vec2::ZERO;
    }

    pub fn walk_speed(&self) -> f32 {
        if self.abilities.fast_run {
            FAST_WALK_SPEED
        } else {
            WALK_SPEED
        }
    }

    pub fn shot_speed(&self) -> f32 {
        if self.abilities.fast_snow {
            FAST_SNOWBALL_SPEED
        } else {
            SNOWBALL_SPEED
        }
    }

    pub fn shot_size(&self) -> f32 {
        if self.abilities.wide_snow {
            HEAVY_SNOWBALL_SIZE
        } else {
            SNOWBALL_SIZE
        }
    }

    /// Maximum snowballs this player may have in flight
    pub fn max_shots(&self) -> usize {
        if self.abilities.fast_snow {
            MAX_SHOTS_RAPID
        } else {
            MAX_SHOTS
        }
    }
}

impl Entity for Player {
    fn id(&self) -> &str {
        &self.id
    }
    fn kind(&self) -> EntityKind {
        EntityKind::Player
    }
    fn body(&self) -> &Body {
        &self.body
    }
}

/// Enemy variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnemyVariant {
    Red,
    Blue,
    Boss,
}

/// Enemy freeze state machine
///
/// Active -> FrozenStatic (freeze level reached) -> FrozenRolling (kicked)
/// -> shattered, or FrozenStatic -> Active when the thaw countdown runs out.
/// A rolling enemy is always frozen; there is no way to spell otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EnemyState {
    Active { freeze_level: f32, dropping: bool },
    FrozenStatic { thaw_ticks: u32 },
    FrozenRolling,
}

impl EnemyState {
    pub const fn fresh() -> Self {
        EnemyState::Active {
            freeze_level: 0.0,
            dropping: false,
        }
    }

    pub fn is_frozen(&self) -> bool {
        !matches!(self, EnemyState::Active { .. })
    }

    pub fn is_rolling(&self) -> bool {
        matches!(self, EnemyState::FrozenRolling)
    }

    /// Accumulated freeze (pinned at the threshold once frozen)
    pub fn freeze_level(&self) -> f32 {
        match self {
            EnemyState::Active { freeze_level, .. } => *freeze_level,
            _ => FREEZE_THRESHOLD,
        }
    }

    pub fn is_dropping(&self) -> bool {
        matches!(self, EnemyState::Active { dropping: true, .. })
    }
}

/// An enemy unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enemy {
    pub id: String,
    pub body: Body,
    pub state: EnemyState,
    /// Only meaningful for the boss; tracked, never checked against zero
    pub hp: i32,
    pub variant: EnemyVariant,
}

impl Enemy {
    pub fn standard(id: String, pos: Vec2, vel: Vec2, variant: EnemyVariant) -> Self {
        Self {
            id,
            body: Body::new(pos, ENEMY_SIZE, ENEMY_SIZE).with_vel(vel),
            state: EnemyState::fresh(),
            hp: ENEMY_HP,
            variant,
        }
    }

    pub fn boss() -> Self {
        let pos = Vec2::new(CANVAS_WIDTH / 2.0 - BOSS_WIDTH / 2.0, BOSS_SPAWN_Y);
        Self {
            id: "boss-final".to_string(),
            body: Body::new(pos, BOSS_WIDTH, BOSS_HEIGHT),
            state: EnemyState::fresh(),
            hp: BOSS_HP,
            variant: EnemyVariant::Boss,
        }
    }

    pub fn is_boss(&self) -> bool {
        self.variant == EnemyVariant::Boss
    }

    /// Freeze gained from one snowball hit
    pub fn freeze_gain(&self, heavy: bool) -> f32 {
        match (self.is_boss(), heavy) {
            (true, true) => BOSS_FREEZE_PER_HEAVY_HIT,
            (true, false) => BOSS_FREEZE_PER_HIT,
            (false, true) => FREEZE_PER_HEAVY_HIT,
            (false, false) => FREEZE_PER_HIT,
        }
    }

    /// Thaw countdown armed when this unit freezes
    pub fn thaw_ticks(&self) -> u32 {
        if self.is_boss() {
            BOSS_THAW_TICKS
        } else {
            THAW_TICKS
        }
    }
}

impl Entity for Enemy {
    fn id(&self) -> &str {
        &self.id
    }
    fn kind(&self) -> EntityKind {
        EntityKind::Enemy
    }
    fn body(&self) -> &Body {
        &self.body
    }
}

/// Who fired a projectile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectileOwner {
    /// Snowball thrown by a player slot; `heavy` when fired with wide shots
    Player { slot: usize, heavy: bool },
    /// Hostile boss shot
    Boss,
}

/// A projectile in flight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    pub id: String,
    pub body: Body,
    pub owner: ProjectileOwner,
}

impl Projectile {
    pub fn fired_by(&self, slot: usize) -> bool {
        matches!(self.owner, ProjectileOwner::Player { slot: s, .. } if s == slot)
    }
}

impl Entity for Projectile {
    fn id(&self) -> &str {
        &self.id
    }
    fn kind(&self) -> EntityKind {
        EntityKind::Projectile
    }
    fn body(&self) -> &Body {
        &self.body
    }
}

/// Power-up types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PowerUpKind {
    FastRun,
    FastSnow,
    WideSnow,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 3] = [
        PowerUpKind::FastRun,
        PowerUpKind::FastSnow,
        PowerUpKind::WideSnow,
    ];

    /// Popup announcement on pickup
    pub fn label(&self) -> &'static str {
        match self {
            PowerUpKind::FastRun => "SPEED BOOST",
            PowerUpKind::FastSnow => "RAPID FIRE",
            PowerUpKind::WideSnow => "HEAVY IMPACT",
        }
    }

    pub fn color(&self) -> u32 {
        match self {
            PowerUpKind::FastRun => 0xfbbf24,
            PowerUpKind::FastSnow => 0xef4444,
            PowerUpKind::WideSnow => 0xa855f7,
        }
    }
}

/// A falling power-up capsule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerUp {
    pub id: String,
    pub body: Body,
    pub kind: PowerUpKind,
    /// Seconds until the capsule expires
    pub ttl: f32,
}

impl Entity for PowerUp {
    fn id(&self) -> &str {
        &self.id
    }
    fn kind(&self) -> EntityKind {
        EntityKind::PowerUp
    }
    fn body(&self) -> &Body {
        &self.body
    }
}

/// A particle for visual effects (not authoritative, never synced)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub life: f32,
    pub size: f32,
    pub color: u32,
    /// Popup annotation text
    pub text: Option<String>,
}

/// Colors used for bursts and popups
pub mod colors {
    pub const ICE: u32 = 0xa5f3fc;
    pub const SNOW: u32 = 0xf8fafc;
    pub const DANGER: u32 = 0xef4444;
    pub const GLOW: u32 = 0x22d3ee;
    pub const WARN: u32 = 0xfacc15;
}

/// Gameplay events emitted during a tick (consumed by audio/UI shells)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    Shot { slot: usize, vel: Vec2 },
    Jumped { slot: usize },
    Frozen { enemy_id: String },
    Kicked { enemy_id: String },
    ChainHit { enemy_id: String },
    Shattered { enemy_id: String },
    PowerUpCollected { slot: usize, kind: PowerUpKind },
    PlayerHit { slot: usize, lives_left: u32 },
    RoundStarted { round: u32 },
    BossWarning,
    Victory,
    Defeat,
}

pub const VICTORY_REASON: &str = "All Systems Decoupled. Total Victory.";
pub const DEFEAT_REASON: &str = "All units terminated. Signal Lost.";

/// Complete simulation state, owned by the tick driver
#[derive(Debug, Clone)]
pub struct SimulationState {
    /// Run seed for reproducibility
    pub seed: u64,
    pub(crate) rng: Pcg32,
    /// Current round (1-indexed)
    pub round: u32,
    pub score: u64,
    /// Simulation tick counter
    pub time_ticks: u64,
    pub phase: GamePhase,
    /// Reason the match ended, once it has
    pub outcome: Option<String>,
    pub authority: Authority,
    /// Active external tuning snapshot
    pub director: DirectorConfig,
    pub players: Vec<Player>,
    pub enemies: Vec<Enemy>,
    pub projectiles: Vec<Projectile>,
    pub powerups: Vec<PowerUp>,
    pub platforms: Vec<Platform>,
    /// Visual particles (not gameplay-affecting)
    pub particles: Vec<Particle>,
    /// Events produced by the most recent tick
    pub events: Vec<GameEvent>,
    next_id: u32,
}

impl SimulationState {
    /// Create a single-player match
    pub fn new(seed: u64) -> Self {
        Self::with_authority(seed, Authority::Solo)
    }

    /// Create a match with the given co-op authority
    ///
    /// Co-op matches carry the remote partner in slot 1. A guest starts with
    /// no enemies and waits for the host's first snapshot.
    pub fn with_authority(seed: u64, authority: Authority) -> Self {
        let mut players = vec![Player::new(0, Control::Local)];
        if authority != Authority::Solo {
            players.push(Player::new(1, Control::Remote));
        }

        let mut state = Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            round: 1,
            score: 0,
            time_ticks: 0,
            phase: GamePhase::Playing,
            outcome: None,
            authority,
            director: DirectorConfig::fallback(),
            players,
            enemies: Vec::new(),
            projectiles: Vec::new(),
            powerups: Vec::new(),
            platforms: super::round::canonical_layout(1),
            particles: Vec::new(),
            events: Vec::new(),
            next_id: 1,
        };

        if authority.owns_world() {
            super::round::spawn_enemies(&mut state);
        }
        state
    }

    /// Allocate a new entity sequence number
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn local_player(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_local())
    }

    pub fn local_player_mut(&mut self) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.is_local())
    }

    pub fn remote_player_mut(&mut self) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| !p.is_local())
    }

    pub fn player(&self, slot: usize) -> Option<&Player> {
        self.players.iter().find(|p| p.slot == slot)
    }

    /// Positions of every player that still has lives
    pub fn living_player_positions(&self) -> Vec<Vec2> {
        self.players
            .iter()
            .filter(|p| p.is_alive())
            .map(|p| p.body.pos)
            .collect()
    }

    /// Floating text annotation
    pub fn popup(&mut self, pos: Vec2, text: impl Into<String>, color: u32, life: f32) {
        self.push_particle(Particle {
            pos,
            vel: Vec2::new(0.0, -1.5),
            life,
            size: 26.0,
            color,
            text: Some(text.into()),
        });
    }

    /// Spray of short-lived particles
    pub fn burst(&mut self, pos: Vec2, color: u32, count: usize) {
        for _ in 0..count {
            let vel = Vec2::new(
                (self.rng.random::<f32>() - 0.5) * 5.0,
                (self.rng.random::<f32>() - 0.5) * 5.0,
            );
            let life = 0.5 + self.rng.random::<f32>() * 0.5;
            let size = 4.0 + self.rng.random::<f32>() * 4.0;
            self.push_particle(Particle {
                pos,
                vel,
                life,
                size,
                color,
                text: None,
            });
        }
    }

    fn push_particle(&mut self, particle: Particle) {
        if self.particles.len() < MAX_PARTICLES {
            self.particles.push(particle);
        }
    }

    /// Read-only snapshot for renderers
    pub fn view(&self) -> StateView<'_> {
        StateView {
            round: self.round,
            score: self.score,
            phase: self.phase,
            director: &self.director,
            players: &self.players,
            enemies: &self.enemies,
            projectiles: &self.projectiles,
            powerups: &self.powerups,
            platforms: &self.platforms,
            particles: &self.particles,
        }
    }
}

/// Borrowed view of everything a renderer needs for one frame
#[derive(Debug, Clone, Copy)]
pub struct StateView<'a> {
    pub round: u32,
    pub score: u64,
    pub phase: GamePhase,
    pub director: &'a DirectorConfig,
    pub players: &'a [Player],
    pub enemies: &'a [Enemy],
    pub projectiles: &'a [Projectile],
    pub powerups: &'a [PowerUp],
    pub platforms: &'a [Platform],
    pub particles: &'a [Particle],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_solo_state() {
        let state = SimulationState::new(7);
        assert_eq!(state.round, 1);
        assert_eq!(state.players.len(), 1);
        assert_eq!(state.enemies.len(), 4);
        assert_eq!(state.phase, GamePhase::Playing);
        assert!(state.local_player().is_some_and(|p| p.slot == 0));
    }

    #[test]
    fn test_guest_waits_for_host_enemies() {
        let state = SimulationState::with_authority(7, Authority::Guest);
        assert_eq!(state.players.len(), 2);
        assert!(state.enemies.is_empty());
        assert_eq!(state.players[1].control, Control::Remote);
        assert_eq!(state.players[1].body.pos, Vec2::new(700.0, 550.0));
    }

    #[test]
    fn test_enemy_state_flags() {
        let active = EnemyState::fresh();
        assert!(!active.is_frozen());
        assert!(!active.is_rolling());

        let frozen = EnemyState::FrozenStatic { thaw_ticks: 10 };
        assert!(frozen.is_frozen());
        assert!(!frozen.is_rolling());
        assert_eq!(frozen.freeze_level(), FREEZE_THRESHOLD);

        let rolling = EnemyState::FrozenRolling;
        assert!(rolling.is_frozen());
        assert!(rolling.is_rolling());
    }

    #[test]
    fn test_player_eliminate_parks_off_field() {
        let mut player = Player::new(0, Control::Local);
        player.lives = 0;
        player.eliminate();
        assert_eq!(player.health, 0);
        assert_eq!(player.body.pos, Vec2::new(-1000.0, -1000.0));
    }

    #[test]
    fn test_freeze_gain_by_variant() {
        let enemy = Enemy::standard("e".into(), Vec2::ZERO, Vec2::ZERO, EnemyVariant::Red);
        assert_eq!(enemy.freeze_gain(false), 35.0);
        assert_eq!(enemy.freeze_gain(true), 50.0);
        let boss = Enemy::boss();
        assert_eq!(boss.freeze_gain(false), 4.0);
        assert_eq!(boss.thaw_ticks(), 400);
        assert_eq!(boss.body.pos, Vec2::new(570.0, 100.0));
    }

    #[test]
    fn test_particle_cap() {
        let mut state = SimulationState::new(1);
        state.burst(Vec2::ZERO, colors::ICE, MAX_PARTICLES + 50);
        assert_eq!(state.particles.len(), MAX_PARTICLES);
    }
}
