//! Combat resolution: snowballs, boss shots, power-ups and contact damage

use glam::Vec2;
use rand::Rng;

use super::collision::{integrate, resolve_landing};
use super::enemy::apply_freeze_hit;
use super::geometry::Rect;
use super::state::{
    Body, GameEvent, PowerUp, PowerUpKind, Projectile, ProjectileOwner, SimulationState, colors,
};
use crate::consts::*;

/// Shot velocity from held directions
///
/// `x`/`y` are the held horizontal and vertical components (-1, 0 or 1).
/// With nothing held the shot goes along `facing`. The result always has
/// length `speed`.
pub fn aim_velocity(x: f32, y: f32, facing: f32, speed: f32) -> Vec2 {
    let dir = if x == 0.0 && y == 0.0 {
        Vec2::new(facing, 0.0)
    } else {
        Vec2::new(x, y)
    };
    dir.normalize_or_zero() * speed
}

/// Throw a snowball for the player in `slot`
///
/// `vel` overrides the aim (used for remote shots, which carry their own
/// velocity). Returns the velocity used, or None when the shot was refused
/// by the in-flight limit or the player cannot shoot.
pub fn fire(state: &mut SimulationState, slot: usize, aim: Vec2, vel: Option<Vec2>) -> Option<Vec2> {
    let player = state.player(slot)?;
    if !player.is_alive() || player.health <= 0 {
        return None;
    }
    let in_flight = state.projectiles.iter().filter(|p| p.fired_by(slot)).count();
    if in_flight >= player.max_shots() {
        return None;
    }

    let vel = vel.unwrap_or_else(|| aim_velocity(aim.x, aim.y, player.facing, player.shot_speed()));
    let size = player.shot_size();
    let pos = player.body.center() - Vec2::splat(size / 2.0);
    let heavy = player.abilities.wide_snow;
    let prefix = player.id.clone();

    let seq = state.next_entity_id();
    state.projectiles.push(Projectile {
        id: format!("{}-{}", prefix, seq),
        body: Body::new(pos, size, size).with_vel(vel),
        owner: ProjectileOwner::Player { slot, heavy },
    });
    state.emit(GameEvent::Shot { slot, vel });
    Some(vel)
}

/// Hostile shot from the boss toward a horizontal direction
pub fn fire_boss_shot(state: &mut SimulationState, origin: Vec2, dir: f32) {
    let spread = (state.rng.random::<f32>() - 0.5) * BOSS_SHOT_SPREAD;
    let seq = state.next_entity_id();
    state.projectiles.push(Projectile {
        id: format!("boss-proj-{}", seq),
        body: Body::new(origin, BOSS_SHOT_SIZE, BOSS_SHOT_SIZE)
            .with_vel(Vec2::new(dir * BOSS_SHOT_SPEED, spread)),
        owner: ProjectileOwner::Boss,
    });
}

/// Playfield bounds outside which projectiles are discarded
fn projectile_bounds() -> Rect {
    Rect::new(0.0, 0.0, CANVAS_WIDTH, CANVAS_HEIGHT).expanded(PROJECTILE_MARGIN)
}

/// Advance projectiles and resolve their hits
///
/// Snowballs stop at the first enemy they touch: an active enemy takes
/// freeze, a frozen one just absorbs the shot. Boss shots ignore enemies and
/// cost a local player a life. Anything that touches a platform is absorbed.
pub fn step_projectiles(state: &mut SimulationState) {
    let bounds = projectile_bounds();
    let projectiles = std::mem::take(&mut state.projectiles);
    let mut kept = Vec::with_capacity(projectiles.len());

    for mut proj in projectiles {
        proj.body.pos += proj.body.vel;
        let rect = proj.body.rect();

        let mut hit = match proj.owner {
            ProjectileOwner::Player { heavy, .. } => hit_enemies(state, &rect, heavy),
            ProjectileOwner::Boss => hit_local_players(state, &rect),
        };
        if !hit && state.platforms.iter().any(|p| p.overlaps(&rect)) {
            hit = true;
            state.burst(proj.body.pos, colors::SNOW, 3);
        }

        if !hit && bounds.contains(proj.body.pos) {
            kept.push(proj);
        }
    }

    state.projectiles = kept;
}

fn hit_enemies(state: &mut SimulationState, rect: &Rect, heavy: bool) -> bool {
    let Some(enemy) = state.enemies.iter_mut().find(|e| e.body.rect().overlaps(rect)) else {
        return false;
    };
    if enemy.state.is_frozen() {
        return true;
    }

    let froze = apply_freeze_hit(enemy, heavy);
    let pos = enemy.body.pos;
    let id = enemy.id.clone();
    let boss = enemy.is_boss();

    if boss {
        state.burst(pos, colors::DANGER, 3);
    }
    state.burst(pos, colors::ICE, 5);
    if froze {
        log::debug!("{} frozen", id);
        state.emit(GameEvent::Frozen { enemy_id: id });
    }
    true
}

fn hit_local_players(state: &mut SimulationState, rect: &Rect) -> bool {
    let target = state
        .players
        .iter()
        .position(|p| p.is_local() && p.is_alive() && p.health > 0 && p.body.rect().overlaps(rect));
    match target {
        Some(index) => {
            damage_player(state, index);
            true
        }
        None => false,
    }
}

/// One qualifying contact event: lose a life, then respawn or drop out
///
/// There is no invulnerability window; a respawned player still touching a
/// threat is hit again on a later tick.
pub fn damage_player(state: &mut SimulationState, index: usize) {
    let Some(player) = state.players.get_mut(index) else {
        return;
    };
    if !player.is_alive() {
        return;
    }
    let hit_pos = player.body.pos;
    player.lives -= 1;
    let lives_left = player.lives;
    let slot = player.slot;

    if lives_left > 0 {
        player.respawn();
        let spawn = player.body.pos;
        state.popup(spawn, "RESPAWNING...", colors::WARN, 1.0);
    } else {
        player.eliminate();
        log::info!("Player {} is out of lives", slot + 1);
    }
    state.burst(hit_pos, colors::DANGER, 30);
    state.emit(GameEvent::PlayerHit { slot, lives_left });
}

/// Maybe drop a random power-up where an enemy shattered
pub fn drop_powerup(state: &mut SimulationState, pos: Vec2) -> bool {
    if !state.rng.random_bool(POWERUP_DROP_CHANCE) {
        return false;
    }
    let kind = PowerUpKind::ALL[state.rng.random_range(0..PowerUpKind::ALL.len())];
    spawn_powerup(state, pos, kind);
    true
}

pub fn spawn_powerup(state: &mut SimulationState, pos: Vec2, kind: PowerUpKind) {
    let seq = state.next_entity_id();
    state.powerups.push(PowerUp {
        id: format!("pu-{}", seq),
        body: Body::new(pos, POWERUP_SIZE, POWERUP_SIZE).with_vel(Vec2::new(0.0, POWERUP_LIFT)),
        kind,
        ttl: POWERUP_TTL,
    });
}

/// Fall, land, expire, and get picked up by local players
pub fn step_powerups(state: &mut SimulationState) {
    let powerups = std::mem::take(&mut state.powerups);
    let mut kept = Vec::with_capacity(powerups.len());

    for mut pu in powerups {
        integrate(&mut pu.body, POWERUP_GRAVITY);
        resolve_landing(&mut pu.body, &state.platforms, PLAYER_LAND_TOLERANCE);
        pu.ttl -= SIM_DT;

        let picker = state
            .players
            .iter_mut()
            .find(|p| p.is_local() && p.is_alive() && p.body.overlaps(&pu.body));
        if let Some(player) = picker {
            player.abilities.grant(pu.kind);
            let slot = player.slot;
            state.score += POWERUP_BONUS;
            state.popup(pu.body.pos, pu.kind.label(), pu.kind.color(), 1.0);
            state.emit(GameEvent::PowerUpCollected { slot, kind: pu.kind });
            continue;
        }

        if pu.ttl > 0.0 {
            kept.push(pu);
        }
    }
    state.powerups = kept;
}
