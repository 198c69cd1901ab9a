//! Round progression and enemy spawning
//!
//! Owns layout selection, enemy population and the victory/defeat checks.
//! Only the world authority (solo or co-op host) spawns and advances rounds.

use glam::Vec2;
use rand::Rng;

use super::geometry::{Platform, Rect};
use super::state::{
    DEFEAT_REASON, Enemy, EnemyVariant, GameEvent, GamePhase, SimulationState, VICTORY_REASON,
    colors,
};
use crate::consts::*;

const fn plat(x: f32, y: f32, w: f32, h: f32) -> Rect {
    Rect::new(x, y, w, h)
}

const FLOOR: Rect = plat(0.0, 650.0, 1280.0, 70.0);

/// Regular arenas, cycled by round
pub const LAYOUTS: [&[Platform]; 5] = [
    &[
        FLOOR,
        plat(200.0, 500.0, 300.0, 20.0),
        plat(700.0, 500.0, 300.0, 20.0),
        plat(450.0, 350.0, 350.0, 20.0),
        plat(100.0, 200.0, 250.0, 20.0),
        plat(900.0, 200.0, 250.0, 20.0),
    ],
    &[
        FLOOR,
        plat(100.0, 450.0, 400.0, 20.0),
        plat(700.0, 450.0, 400.0, 20.0),
        plat(400.0, 250.0, 480.0, 20.0),
        plat(200.0, 100.0, 150.0, 20.0),
        plat(900.0, 100.0, 150.0, 20.0),
    ],
    &[
        FLOOR,
        plat(50.0, 500.0, 200.0, 20.0),
        plat(300.0, 400.0, 200.0, 20.0),
        plat(550.0, 300.0, 200.0, 20.0),
        plat(800.0, 400.0, 200.0, 20.0),
        plat(1050.0, 500.0, 200.0, 20.0),
    ],
    &[
        FLOOR,
        plat(200.0, 550.0, 200.0, 20.0),
        plat(880.0, 550.0, 200.0, 20.0),
        plat(440.0, 450.0, 400.0, 20.0),
        plat(100.0, 350.0, 300.0, 20.0),
        plat(880.0, 350.0, 300.0, 20.0),
        plat(440.0, 200.0, 400.0, 20.0),
    ],
    &[
        FLOOR,
        plat(540.0, 500.0, 200.0, 20.0),
        plat(300.0, 350.0, 680.0, 20.0),
        plat(50.0, 200.0, 400.0, 20.0),
        plat(830.0, 200.0, 400.0, 20.0),
    ],
];

/// Boss arena for the terminal round
pub const BOSS_LAYOUT: &[Platform] = &[
    FLOOR,
    plat(100.0, 450.0, 300.0, 30.0),
    plat(880.0, 450.0, 300.0, 30.0),
    plat(490.0, 250.0, 300.0, 30.0),
];

/// Canonical (unjittered) layout for a round
pub fn canonical_layout(round: u32) -> Vec<Platform> {
    if round >= BOSS_ROUND {
        return BOSS_LAYOUT.to_vec();
    }
    let index = (round.saturating_sub(1) as usize) % LAYOUTS.len();
    LAYOUTS[index].to_vec()
}

/// Layout for a round with per-platform jitter on x and width
pub fn jittered_layout(round: u32, rng: &mut impl Rng) -> Vec<Platform> {
    canonical_layout(round)
        .into_iter()
        .map(|p| Rect {
            x: p.x + rng.random_range(-LAYOUT_JITTER_X..LAYOUT_JITTER_X),
            w: p.w + rng.random_range(-LAYOUT_JITTER_W..LAYOUT_JITTER_W),
            ..p
        })
        .collect()
}

/// Number of standard enemies for a round
pub fn enemy_count(round: u32) -> u32 {
    (3 + round).min(MAX_ENEMIES)
}

/// Sample a spawn point away from every living player
///
/// Tries up to `attempts` uniform samples in the spawn band and returns the
/// first whose distance to every player exceeds `safe_distance`. When no
/// sample qualifies the last one is returned anyway so spawning never blocks.
/// The flag reports whether the result is safe.
pub fn sample_spawn_point(
    rng: &mut impl Rng,
    players: &[Vec2],
    safe_distance: f32,
    attempts: u32,
) -> (Vec2, bool) {
    let mut candidate = Vec2::new(SPAWN_MIN_X, SPAWN_MIN_Y);
    for _ in 0..attempts.max(1) {
        candidate = Vec2::new(
            SPAWN_MIN_X + rng.random::<f32>() * (CANVAS_WIDTH - 2.0 * SPAWN_MIN_X),
            SPAWN_MIN_Y + rng.random::<f32>() * SPAWN_BAND_HEIGHT,
        );
        if players
            .iter()
            .all(|p| p.distance(candidate) > safe_distance)
        {
            return (candidate, true);
        }
    }
    (candidate, false)
}

/// Populate the enemy list for the current round (replaces it wholesale)
pub fn spawn_enemies(state: &mut SimulationState) {
    let round = state.round;
    if round == BOSS_ROUND {
        state.enemies = vec![Enemy::boss()];
        state.popup(
            Vec2::new(CANVAS_WIDTH / 2.0, CANVAS_HEIGHT / 2.0),
            "FATAL_UNIT_APPROACHING",
            colors::DANGER,
            3.0,
        );
        state.emit(GameEvent::BossWarning);
        log::info!("Round {}: boss spawned", round);
        return;
    }

    let players = state.living_player_positions();
    let count = enemy_count(round);
    let mut enemies = Vec::with_capacity(count as usize);
    let mut unsafe_spawns = 0;

    for i in 0..count {
        let (pos, safe) =
            sample_spawn_point(&mut state.rng, &players, SAFE_SPAWN_DISTANCE, SPAWN_ATTEMPTS);
        if !safe {
            unsafe_spawns += 1;
        }
        let vel = Vec2::new((state.rng.random::<f32>() - 0.5) * 4.0, 0.0);
        let variant = if state.rng.random::<f32>() > 0.5 {
            EnemyVariant::Red
        } else {
            EnemyVariant::Blue
        };
        enemies.push(Enemy::standard(format!("e-{}-{}", round, i), pos, vel, variant));
    }

    if unsafe_spawns > 0 {
        log::debug!("Round {}: {} enemies placed without a safe spot", round, unsafe_spawns);
    }
    log::info!("Round {}: spawned {} enemies", round, count);
    state.enemies = enemies;
}

/// Move to the next round: new layout, local player back to spawn, fresh enemies
pub fn advance_round(state: &mut SimulationState) {
    state.round += 1;
    let round = state.round;
    state.platforms = jittered_layout(round, &mut state.rng);
    if let Some(player) = state.local_player_mut() {
        if player.is_alive() {
            player.respawn();
        }
    }
    state.projectiles.clear();
    spawn_enemies(state);
    state.popup(
        Vec2::new(CANVAS_WIDTH / 2.0, CANVAS_HEIGHT / 2.0),
        format!("INITIATING ROUND {}", round),
        colors::GLOW,
        2.0,
    );
    state.emit(GameEvent::RoundStarted { round });
}

/// Guest side of a host round transition
///
/// Enemies and platforms arrive with the next host snapshot; this only
/// adopts the round number and resets the local player.
pub fn adopt_round(state: &mut SimulationState, round: u32) {
    if round <= state.round {
        log::debug!("Ignoring stale round {} (at {})", round, state.round);
        return;
    }
    state.round = round;
    if let Some(player) = state.local_player_mut() {
        if player.is_alive() {
            player.respawn();
        }
    }
    state.popup(
        Vec2::new(CANVAS_WIDTH / 2.0, CANVAS_HEIGHT / 2.0),
        format!("INITIATING ROUND {}", round),
        colors::GLOW,
        2.0,
    );
    state.emit(GameEvent::RoundStarted { round });
}

/// Round-clear evaluation; returns true if a new round started
///
/// A guest judges terminal-round victory on its replicated enemy list but
/// never starts rounds itself.
pub fn check_round_clear(state: &mut SimulationState) -> bool {
    if !state.enemies.is_empty() || state.phase.is_over() {
        return false;
    }
    if state.round >= BOSS_ROUND {
        state.phase = GamePhase::Victory;
        state.outcome = Some(VICTORY_REASON.to_string());
        state.emit(GameEvent::Victory);
        log::info!("Victory at round {} with score {}", state.round, state.score);
        return false;
    }
    if !state.authority.owns_world() {
        return false;
    }
    advance_round(state);
    log::info!("Round {} started", state.round);
    true
}

/// Defeat once every player in the match is out of lives
pub fn check_defeat(state: &mut SimulationState) -> bool {
    if state.phase.is_over() || state.players.iter().any(|p| p.is_alive()) {
        return false;
    }
    state.phase = GamePhase::Defeat;
    state.outcome = Some(DEFEAT_REASON.to_string());
    state.emit(GameEvent::Defeat);
    log::info!("Defeat at round {} with score {}", state.round, state.score);
    true
}
