//! Enemy AI and the freeze/roll/shatter state machine
//!
//! Active enemies chase the nearest living player, hop, drop through
//! platforms when hunting downward, and hurt local players on contact.
//! Frozen enemies sit still until they thaw or a player kicks them, after
//! which they roll until they hit a side wall or lose their momentum.

use glam::Vec2;
use rand::Rng;

use super::collision::{clamp_to_world, integrate, resolve_landing, touches_side_wall};
use super::combat::{damage_player, drop_powerup, fire_boss_shot};
use super::geometry::heading_toward;
use super::state::{Enemy, EnemyState, GameEvent, SimulationState, colors};
use crate::consts::*;

/// Horizontal chase speed for standard enemies
pub fn enemy_speed(round: u32, difficulty: f32) -> f32 {
    (ENEMY_BASE_SPEED + round as f32 * ENEMY_SPEED_PER_ROUND) * difficulty
}

/// Nearest target by horizontal distance
pub fn nearest_target(x: f32, targets: &[Vec2]) -> Option<Vec2> {
    targets.iter().copied().reduce(|best, candidate| {
        if (candidate.x - x).abs() < (best.x - x).abs() {
            candidate
        } else {
            best
        }
    })
}

/// Drop-hunt hysteresis: enter when the target is well below, leave once
/// level with (or below) it
pub fn update_dropping(dropping: bool, enemy_y: f32, target_y: f32) -> bool {
    if target_y > enemy_y + DROP_ENTER_GAP {
        true
    } else if enemy_y > target_y - DROP_EXIT_GAP {
        false
    } else {
        dropping
    }
}

/// Apply one snowball hit to an active enemy; returns true if it froze
///
/// Frozen enemies are unaffected. The boss also loses hit points on every
/// hit it takes while unfrozen.
pub fn apply_freeze_hit(enemy: &mut Enemy, heavy: bool) -> bool {
    let EnemyState::Active {
        freeze_level,
        dropping,
    } = enemy.state
    else {
        return false;
    };
    if enemy.is_boss() {
        enemy.hp -= BOSS_DAMAGE_PER_HIT;
    }
    let level = freeze_level + enemy.freeze_gain(heavy);
    if level >= FREEZE_THRESHOLD {
        enemy.state = EnemyState::FrozenStatic {
            thaw_ticks: enemy.thaw_ticks(),
        };
        true
    } else {
        enemy.state = EnemyState::Active {
            freeze_level: level,
            dropping,
        };
        false
    }
}

/// Advance every enemy by one tick, then drop the shattered ones
pub fn step_enemies(state: &mut SimulationState) {
    let targets = state.living_player_positions();
    let count = state.enemies.len();
    let mut shattered = vec![false; count];

    for i in 0..count {
        if shattered[i] {
            continue;
        }
        match state.enemies[i].state {
            EnemyState::Active { .. } => step_active(state, i, &targets),
            EnemyState::FrozenStatic { .. } => step_frozen(state, i),
            EnemyState::FrozenRolling => {
                if step_rolling(state, i, &shattered) {
                    shattered[i] = true;
                }
            }
        }
    }

    let mut index = 0;
    state.enemies.retain(|_| {
        let keep = !shattered[index];
        index += 1;
        keep
    });
}

fn step_active(state: &mut SimulationState, i: usize, targets: &[Vec2]) {
    let round = state.round;
    let speed = enemy_speed(round, state.director.difficulty);
    let hop_roll = state.rng.random_bool(HOP_CHANCE);
    let leap_roll = state.rng.random_bool(BOSS_LEAP_CHANCE);
    let shot_roll = state.rng.random_bool(BOSS_SHOT_CHANCE);

    let platforms = &state.platforms;
    let enemy = &mut state.enemies[i];
    let EnemyState::Active {
        freeze_level,
        dropping,
    } = enemy.state
    else {
        return;
    };

    let target = nearest_target(enemy.body.pos.x, targets).unwrap_or(enemy.body.pos);
    let dropping = update_dropping(dropping, enemy.body.pos.y, target.y);
    let dir = heading_toward(enemy.body.pos.x, target.x);
    let mut boss_shot = None;

    if enemy.is_boss() {
        if leap_roll && enemy.body.vel.y == 0.0 {
            enemy.body.vel.y = BOSS_LEAP_FORCE;
        }
        enemy.body.vel.x = dir * BOSS_SPEED;
        if shot_roll {
            boss_shot = Some(enemy.body.center());
        }
    } else {
        enemy.body.vel.x = dir * speed;
        if hop_roll && !dropping {
            enemy.body.vel.y = HOP_FORCE + HOP_FORCE_PER_ROUND * round as f32;
        }
    }

    enemy.body.pos.x += enemy.body.vel.x;
    enemy.body.vel.y += GRAVITY;
    enemy.body.pos.y += enemy.body.vel.y;
    if !dropping {
        resolve_landing(&mut enemy.body, platforms, ENEMY_LAND_TOLERANCE);
    }
    clamp_to_world(&mut enemy.body);
    enemy.state = EnemyState::Active {
        freeze_level,
        dropping,
    };
    let rect = enemy.body.rect();

    if let Some(origin) = boss_shot {
        fire_boss_shot(state, origin, dir);
    }

    // Contact damage against local players only; the partner's peer handles theirs
    let victims: Vec<usize> = state
        .players
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_local() && p.is_alive() && p.body.rect().overlaps(&rect))
        .map(|(index, _)| index)
        .collect();
    for index in victims {
        damage_player(state, index);
    }
}

fn step_frozen(state: &mut SimulationState, i: usize) {
    let rect = state.enemies[i].body.rect();
    let kicker = state
        .players
        .iter()
        .find(|p| p.is_alive() && p.health > 0 && p.body.rect().overlaps(&rect))
        .map(|p| p.facing);

    let enemy = &mut state.enemies[i];
    if let Some(facing) = kicker {
        enemy.state = EnemyState::FrozenRolling;
        enemy.body.vel = Vec2::new(facing * KICK_SPEED, KICK_LIFT);
        let enemy_id = enemy.id.clone();
        state.emit(GameEvent::Kicked { enemy_id });
        return;
    }

    if let EnemyState::FrozenStatic { thaw_ticks } = enemy.state {
        let remaining = thaw_ticks.saturating_sub(1);
        enemy.state = if remaining == 0 {
            EnemyState::fresh()
        } else {
            EnemyState::FrozenStatic {
                thaw_ticks: remaining,
            }
        };
    }
}

/// Returns true when the rolling enemy shattered this tick
fn step_rolling(state: &mut SimulationState, i: usize, shattered: &[bool]) -> bool {
    let platforms = &state.platforms;
    let enemy = &mut state.enemies[i];
    integrate(&mut enemy.body, GRAVITY);
    resolve_landing(&mut enemy.body, platforms, ENEMY_LAND_TOLERANCE);

    if touches_side_wall(&enemy.body) {
        shatter(state, i);
        return true;
    }

    let rect = enemy.body.rect();
    let carried = enemy.body.vel.x * CHAIN_TRANSFER;
    let mut chained = Vec::new();
    for (j, other) in state.enemies.iter_mut().enumerate() {
        if j == i || shattered[j] || other.state.is_rolling() {
            continue;
        }
        if other.body.rect().overlaps(&rect) {
            other.state = EnemyState::FrozenRolling;
            other.body.vel = Vec2::new(carried, CHAIN_LIFT);
            chained.push((other.id.clone(), other.body.pos));
        }
    }
    for (enemy_id, pos) in chained {
        state.burst(pos, colors::ICE, 15);
        state.score += CHAIN_BONUS;
        state.emit(GameEvent::ChainHit { enemy_id });
    }

    if state.enemies[i].body.vel.x.abs() < ROLL_SHATTER_SPEED {
        shatter(state, i);
        return true;
    }
    false
}

fn shatter(state: &mut SimulationState, i: usize) {
    let pos = state.enemies[i].body.pos;
    let enemy_id = state.enemies[i].id.clone();
    let drop_at = Vec2::new(pos.x.clamp(0.0, CANVAS_WIDTH - POWERUP_SIZE), pos.y);
    drop_powerup(state, drop_at);
    state.burst(pos, colors::ICE, 25);
    log::debug!("{} shattered", enemy_id);
    state.emit(GameEvent::Shattered { enemy_id });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::{Authority, EnemyVariant};

    fn state_with(enemies: Vec<Enemy>) -> SimulationState {
        let mut state = SimulationState::new(21);
        state.enemies = enemies;
        state
    }

    fn enemy_at(id: &str, x: f32, y: f32) -> Enemy {
        Enemy::standard(id.into(), Vec2::new(x, y), Vec2::ZERO, EnemyVariant::Blue)
    }

    #[test]
    fn test_nearest_target_by_horizontal_distance() {
        let targets = [Vec2::new(100.0, 0.0), Vec2::new(700.0, 600.0)];
        assert_eq!(nearest_target(600.0, &targets), Some(targets[1]));
        assert_eq!(nearest_target(200.0, &targets), Some(targets[0]));
        assert_eq!(nearest_target(0.0, &[]), None);
    }

    #[test]
    fn test_dropping_hysteresis() {
        assert!(update_dropping(false, 100.0, 200.0));
        // Between thresholds keeps the current mode
        assert!(update_dropping(true, 100.0, 140.0));
        assert!(!update_dropping(false, 100.0, 140.0));
        // Near the target's height ends the hunt
        assert!(!update_dropping(true, 195.0, 200.0));
    }

    #[test]
    fn test_speed_scales_with_round_and_difficulty() {
        assert!((enemy_speed(1, 1.0) - 1.8).abs() < 1e-6);
        assert!((enemy_speed(5, 2.0) - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_freeze_accumulates_then_freezes() {
        let mut enemy = enemy_at("e", 0.0, 0.0);
        assert!(!apply_freeze_hit(&mut enemy, false));
        assert!(!apply_freeze_hit(&mut enemy, false));
        assert_eq!(enemy.state.freeze_level(), 70.0);
        assert!(apply_freeze_hit(&mut enemy, false));
        assert_eq!(enemy.state, EnemyState::FrozenStatic { thaw_ticks: THAW_TICKS });
        // Further hits do nothing
        assert!(!apply_freeze_hit(&mut enemy, true));
    }

    #[test]
    fn test_heavy_hits_freeze_faster() {
        let mut enemy = enemy_at("e", 0.0, 0.0);
        assert!(!apply_freeze_hit(&mut enemy, true));
        assert!(apply_freeze_hit(&mut enemy, true));
    }

    #[test]
    fn test_boss_takes_hp_damage_but_never_dies() {
        let mut boss = Enemy::boss();
        for _ in 0..24 {
            apply_freeze_hit(&mut boss, false);
        }
        assert!(!boss.state.is_frozen());
        assert_eq!(boss.hp, BOSS_HP - 24 * BOSS_DAMAGE_PER_HIT);
        assert!(apply_freeze_hit(&mut boss, false));
        assert_eq!(boss.state, EnemyState::FrozenStatic { thaw_ticks: BOSS_THAW_TICKS });
    }

    #[test]
    fn test_active_enemy_chases_player() {
        let mut state = state_with(vec![enemy_at("e", 600.0, 606.0)]);
        step_enemies(&mut state);
        assert!(state.enemies[0].body.vel.x < 0.0);
        assert!(state.enemies[0].body.pos.x < 600.0);
    }

    #[test]
    fn test_contact_costs_local_player_a_life() {
        let mut state = state_with(vec![enemy_at("e", 105.0, 560.0)]);
        step_enemies(&mut state);
        assert_eq!(state.players[0].lives, PLAYER_LIVES - 1);
        assert_eq!(state.players[0].body.pos, Vec2::new(100.0, 550.0));
    }

    #[test]
    fn test_remote_player_is_not_damaged_locally() {
        let mut state = SimulationState::with_authority(21, Authority::Host);
        state.enemies = vec![enemy_at("e", 705.0, 560.0)];
        step_enemies(&mut state);
        assert_eq!(state.players[1].lives, PLAYER_LIVES);
    }

    #[test]
    fn test_frozen_enemy_thaws() {
        let mut enemy = enemy_at("e", 900.0, 100.0);
        enemy.state = EnemyState::FrozenStatic { thaw_ticks: 3 };
        let mut state = state_with(vec![enemy]);
        step_enemies(&mut state);
        step_enemies(&mut state);
        assert!(state.enemies[0].state.is_frozen());
        step_enemies(&mut state);
        assert_eq!(state.enemies[0].state, EnemyState::fresh());
    }

    #[test]
    fn test_kick_starts_rolling() {
        let mut enemy = enemy_at("e", 110.0, 560.0);
        enemy.state = EnemyState::FrozenStatic { thaw_ticks: 100 };
        let mut state = state_with(vec![enemy]);
        state.players[0].facing = 1.0;
        step_enemies(&mut state);
        assert_eq!(state.enemies[0].state, EnemyState::FrozenRolling);
        assert_eq!(state.enemies[0].body.vel, Vec2::new(KICK_SPEED, KICK_LIFT));
        assert!(state.events.iter().any(|e| matches!(e, GameEvent::Kicked { .. })));
    }

    #[test]
    fn test_rolling_shatters_on_wall() {
        let mut enemy = enemy_at("e", 1220.0, 606.0);
        enemy.state = EnemyState::FrozenRolling;
        enemy.body.vel = Vec2::new(18.0, 0.0);
        let mut state = state_with(vec![enemy]);
        step_enemies(&mut state);
        assert!(state.enemies.is_empty());
        assert!(state.events.iter().any(|e| matches!(e, GameEvent::Shattered { .. })));
        for pu in &state.powerups {
            assert!(pu.body.pos.x <= CANVAS_WIDTH - POWERUP_SIZE);
        }
    }

    #[test]
    fn test_slow_roller_shatters() {
        let mut enemy = enemy_at("e", 600.0, 606.0);
        enemy.state = EnemyState::FrozenRolling;
        enemy.body.vel = Vec2::new(0.5, 0.0);
        let mut state = state_with(vec![enemy]);
        step_enemies(&mut state);
        assert!(state.enemies.is_empty());
    }

    #[test]
    fn test_chain_reaction() {
        let mut roller = enemy_at("a", 500.0, 606.0);
        roller.state = EnemyState::FrozenRolling;
        roller.body.vel = Vec2::new(18.0, 0.0);
        let target = enemy_at("b", 540.0, 606.0);
        let mut state = state_with(vec![roller, target]);
        step_enemies(&mut state);

        let chained = &state.enemies[1];
        assert_eq!(chained.state, EnemyState::FrozenRolling);
        assert!(chained.state.is_frozen());
        assert_eq!(state.score, CHAIN_BONUS);
        assert!(chained.body.vel.x > 0.0);
    }

    #[test]
    fn test_boss_moves_at_fixed_speed() {
        let mut state = state_with(vec![Enemy::boss()]);
        state.director.difficulty = 2.5;
        step_enemies(&mut state);
        assert_eq!(state.enemies[0].body.vel.x.abs(), BOSS_SPEED);
    }
}
