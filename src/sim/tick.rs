//! Fixed timestep simulation tick
//!
//! Core game loop that advances simulation deterministically.

use glam::Vec2;

use super::collision::{apply_friction, clamp_to_world, integrate, resolve_landing};
use super::combat::{fire, step_powerups, step_projectiles};
use super::enemy::step_enemies;
use super::round::{check_defeat, check_round_clear};
use super::state::{EnemyState, GameEvent, GamePhase, SimulationState};
use crate::consts::*;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickInput {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub jump: bool,
    /// Throw one snowball this tick (already edge-triggered by the caller)
    pub fire: bool,
    /// Pause toggle
    pub pause: bool,
    /// Idle/demo mode - a bot drives the local player
    pub idle_mode: bool,
}

impl TickInput {
    /// Held directions as an aim vector with components in {-1, 0, 1}
    pub fn aim(&self) -> Vec2 {
        let x = match (self.left, self.right) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        };
        let y = match (self.up, self.down) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        };
        Vec2::new(x, y)
    }
}

/// Advance the game state by one fixed timestep
pub fn tick(state: &mut SimulationState, input: &TickInput) {
    state.events.clear();

    // Handle pause toggle
    if input.pause {
        match state.phase {
            GamePhase::Playing => {
                state.phase = GamePhase::Paused;
                return;
            }
            GamePhase::Paused => state.phase = GamePhase::Playing,
            _ => {}
        }
    }

    // Don't tick if paused or the match is over
    if state.phase != GamePhase::Playing {
        return;
    }
    state.time_ticks += 1;

    let input = if input.idle_mode {
        bot_input(state)
    } else {
        input.clone()
    };

    step_local_players(state, &input);
    step_projectiles(state);
    step_powerups(state);
    step_enemies(state);
    check_round_clear(state);
    check_defeat(state);
    step_particles(state);
}

/// Apply input and physics to every locally controlled player
fn step_local_players(state: &mut SimulationState, input: &TickInput) {
    let mut shooters = Vec::new();

    for player in state.players.iter_mut().filter(|p| p.is_local()) {
        if !player.is_alive() || player.health <= 0 {
            continue;
        }

        // Movement
        if input.left && !input.right {
            player.body.vel.x = -player.walk_speed();
            player.facing = -1.0;
        } else if input.right && !input.left {
            player.body.vel.x = player.walk_speed();
            player.facing = 1.0;
        } else {
            apply_friction(&mut player.body, FRICTION);
        }

        if input.jump && !player.is_jumping {
            player.body.vel.y = JUMP_FORCE;
            player.is_jumping = true;
            state.events.push(GameEvent::Jumped { slot: player.slot });
        }
        if input.fire {
            shooters.push(player.slot);
        }

        // Physics
        integrate(&mut player.body, GRAVITY);
        player.is_jumping = true;
        if resolve_landing(&mut player.body, &state.platforms, PLAYER_LAND_TOLERANCE) {
            player.is_jumping = false;
        }
        clamp_to_world(&mut player.body);
    }

    for slot in shooters {
        fire(state, slot, input.aim(), None);
    }
}

/// Drift and fade particles, dropping the expired ones
fn step_particles(state: &mut SimulationState) {
    for particle in &mut state.particles {
        particle.pos += particle.vel;
        particle.life -= PARTICLE_DECAY;
    }
    state.particles.retain(|p| p.life > 0.0);
}

/// Scripted input for idle/demo play
///
/// Walks into frozen enemies to kick them, otherwise lines up with the
/// nearest active enemy and throws. Grabs nearby power-ups when nothing is
/// close.
pub fn bot_input(state: &SimulationState) -> TickInput {
    let mut input = TickInput::default();
    let Some(player) = state.local_player() else {
        return input;
    };
    let me = player.body.center();

    let nearest = |pred: &dyn Fn(&EnemyState) -> bool| {
        state
            .enemies
            .iter()
            .filter(|e| pred(&e.state))
            .map(|e| e.body.center())
            .min_by(|a, b| {
                a.distance(me)
                    .partial_cmp(&b.distance(me))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    };

    let frozen = nearest(&|s: &EnemyState| matches!(s, EnemyState::FrozenStatic { .. }));
    let active = nearest(&|s: &EnemyState| !s.is_frozen());
    let pickup = state.powerups.first().map(|p| p.body.center());

    let goal = match (frozen, active, pickup) {
        (Some(target), _, _) => Some((target, true)),
        (None, Some(target), _) if target.distance(me) < 300.0 => Some((target, false)),
        (None, _, Some(target)) => Some((target, true)),
        (None, Some(target), None) => Some((target, false)),
        (None, None, None) => None,
    };

    if let Some((target, approach)) = goal {
        let dx = target.x - me.x;
        let dy = target.y - me.y;
        let facing_target = dx.signum() == player.facing;

        if approach || dx.abs() > 200.0 || !facing_target {
            input.left = dx < -4.0;
            input.right = dx > 4.0;
        }
        input.jump = dy < -80.0 && !player.is_jumping;

        if !approach {
            input.up = dy < -60.0;
            input.down = dy > 60.0;
            input.fire = facing_target && state.time_ticks % 8 == 0;
        }
    }
    input
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::round::canonical_layout;
    use crate::sim::state::{Authority, DEFEAT_REASON, Enemy, EnemyVariant, VICTORY_REASON};
    use proptest::prelude::*;

    fn frozen_at(id: &str, x: f32) -> Enemy {
        let mut enemy = Enemy::standard(id.into(), Vec2::new(x, 606.0), Vec2::ZERO, EnemyVariant::Red);
        enemy.state = EnemyState::FrozenStatic { thaw_ticks: THAW_TICKS };
        enemy
    }

    fn grounded_state() -> SimulationState {
        let mut state = SimulationState::new(12345);
        state.enemies.clear();
        state.players[0].body.pos.y = 650.0 - PLAYER_HEIGHT;
        state.players[0].is_jumping = false;
        state
    }

    #[test]
    fn test_tick_pause() {
        let mut state = SimulationState::new(12345);
        let input = TickInput {
            pause: true,
            ..Default::default()
        };
        tick(&mut state, &input);
        assert_eq!(state.phase, GamePhase::Paused);

        let before = state.time_ticks;
        tick(&mut state, &TickInput::default());
        assert_eq!(state.time_ticks, before);

        // Unpause
        tick(&mut state, &input);
        assert_eq!(state.phase, GamePhase::Playing);
        assert_eq!(state.time_ticks, before + 1);
    }

    #[test]
    fn test_walk_and_friction() {
        let mut state = grounded_state();
        let right = TickInput {
            right: true,
            ..Default::default()
        };
        tick(&mut state, &right);
        assert_eq!(state.players[0].body.vel.x, WALK_SPEED);
        assert_eq!(state.players[0].facing, 1.0);

        tick(&mut state, &TickInput::default());
        assert!((state.players[0].body.vel.x - WALK_SPEED * FRICTION).abs() < 1e-5);

        let left = TickInput {
            left: true,
            ..Default::default()
        };
        tick(&mut state, &left);
        assert_eq!(state.players[0].body.vel.x, -WALK_SPEED);
        assert_eq!(state.players[0].facing, -1.0);
    }

    #[test]
    fn test_fast_run_ability() {
        let mut state = grounded_state();
        state.players[0].abilities.fast_run = true;
        let right = TickInput {
            right: true,
            ..Default::default()
        };
        tick(&mut state, &right);
        assert_eq!(state.players[0].body.vel.x, FAST_WALK_SPEED);
    }

    #[test]
    fn test_jump_only_from_ground() {
        let mut state = grounded_state();
        let jump = TickInput {
            jump: true,
            ..Default::default()
        };
        tick(&mut state, &jump);
        assert!(state.players[0].body.vel.y < 0.0);
        assert!(state.events.contains(&GameEvent::Jumped { slot: 0 }));

        tick(&mut state, &jump);
        assert!(!state.events.iter().any(|e| matches!(e, GameEvent::Jumped { .. })));
    }

    #[test]
    fn test_fire_uses_held_direction() {
        let mut state = grounded_state();
        let input = TickInput {
            up: true,
            fire: true,
            ..Default::default()
        };
        tick(&mut state, &input);
        assert_eq!(state.projectiles.len(), 1);
        assert_eq!(state.projectiles[0].body.vel, Vec2::new(0.0, -SNOWBALL_SPEED));
    }

    #[test]
    fn test_chain_reaction_clears_round() {
        let mut state = SimulationState::new(4242);
        let mut roller = frozen_at("a", 250.0);
        roller.state = EnemyState::FrozenRolling;
        roller.body.vel = Vec2::new(KICK_SPEED, 0.0);
        state.enemies = vec![roller, frozen_at("b", 320.0), frozen_at("c", 400.0), frozen_at("d", 480.0)];

        let mut chains = 0;
        for _ in 0..200 {
            tick(&mut state, &TickInput::default());
            chains += state
                .events
                .iter()
                .filter(|e| matches!(e, GameEvent::ChainHit { .. }))
                .count();
            if state.round == 2 {
                break;
            }
        }

        assert_eq!(chains, 3);
        assert_eq!(state.round, 2);
        assert_eq!(state.enemies.len(), 5);
        assert_ne!(state.platforms, canonical_layout(1));
        assert!(state.score >= 3 * CHAIN_BONUS);
        assert!(state.events.contains(&GameEvent::RoundStarted { round: 2 }));
    }

    #[test]
    fn test_defeat_when_last_life_lost() {
        let mut state = SimulationState::new(3);
        state.players[0].lives = 1;
        state.enemies = vec![Enemy::standard(
            "e-1-0".into(),
            Vec2::new(100.0, 560.0),
            Vec2::ZERO,
            EnemyVariant::Blue,
        )];
        tick(&mut state, &TickInput::default());
        assert_eq!(state.phase, GamePhase::Defeat);
        assert_eq!(state.outcome.as_deref(), Some(DEFEAT_REASON));
        assert!(state.events.contains(&GameEvent::Defeat));

        let ticks = state.time_ticks;
        tick(&mut state, &TickInput::default());
        assert_eq!(state.time_ticks, ticks);
    }

    #[test]
    fn test_victory_after_boss_round() {
        let mut state = SimulationState::new(3);
        state.round = BOSS_ROUND;
        state.enemies.clear();
        tick(&mut state, &TickInput::default());
        assert_eq!(state.phase, GamePhase::Victory);
        assert_eq!(state.outcome.as_deref(), Some(VICTORY_REASON));
    }

    #[test]
    fn test_guest_never_advances() {
        let mut state = SimulationState::with_authority(3, Authority::Guest);
        for _ in 0..30 {
            tick(&mut state, &TickInput::default());
        }
        assert_eq!(state.round, 1);
        assert!(state.enemies.is_empty());
        // Remote partner is never simulated locally
        assert_eq!(state.players[1].body.pos, Vec2::new(700.0, 550.0));
    }

    #[test]
    fn test_particles_decay() {
        let mut state = grounded_state();
        state.popup(Vec2::ZERO, "hi", 0, 0.05);
        tick(&mut state, &TickInput::default());
        assert_eq!(state.particles.len(), 1);
        for _ in 0..3 {
            tick(&mut state, &TickInput::default());
        }
        assert!(state.particles.is_empty());
    }

    #[test]
    fn test_determinism() {
        // Two states with same seed should produce identical results
        let mut state1 = SimulationState::new(99999);
        let mut state2 = SimulationState::new(99999);
        let input = TickInput {
            idle_mode: true,
            ..Default::default()
        };

        for _ in 0..600 {
            tick(&mut state1, &input);
            tick(&mut state2, &input);
        }

        assert_eq!(state1.round, state2.round);
        assert_eq!(state1.score, state2.score);
        assert_eq!(state1.phase, state2.phase);
        assert_eq!(
            serde_json::to_string(&state1.players).unwrap(),
            serde_json::to_string(&state2.players).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&state1.enemies).unwrap(),
            serde_json::to_string(&state2.enemies).unwrap()
        );
    }

    fn decode(bits: u8) -> TickInput {
        TickInput {
            left: bits & 1 != 0,
            right: bits & 2 != 0,
            up: bits & 4 != 0,
            down: bits & 8 != 0,
            jump: bits & 16 != 0,
            fire: bits & 32 != 0,
            pause: false,
            idle_mode: false,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_invariants_hold(seed in any::<u64>(), inputs in proptest::collection::vec(any::<u8>(), 1..300)) {
            let mut state = SimulationState::new(seed);
            let mut lives = state.players[0].lives;

            for bits in inputs {
                let levels: Vec<(String, f32)> = state
                    .enemies
                    .iter()
                    .filter(|e| !e.state.is_frozen())
                    .map(|e| (e.id.clone(), e.state.freeze_level()))
                    .collect();
                tick(&mut state, &decode(bits));

                for enemy in &state.enemies {
                    prop_assert!(!enemy.state.is_rolling() || enemy.state.is_frozen());
                    let level = enemy.state.freeze_level();
                    prop_assert!((0.0..=FREEZE_THRESHOLD).contains(&level));
                    // Freeze never decreases while the enemy stays unfrozen
                    if let Some((_, before)) = levels.iter().find(|(id, _)| *id == enemy.id) {
                        if !enemy.state.is_frozen() {
                            prop_assert!(level >= *before);
                        }
                    }
                }

                let player = &state.players[0];
                prop_assert!(player.lives <= lives);
                lives = player.lives;

                let in_flight = state.projectiles.iter().filter(|p| p.fired_by(0)).count();
                prop_assert!(in_flight <= player.max_shots());
            }
        }
    }
}
