//! Co-op wire protocol
//!
//! JSON text frames tagged by `type` with the body under `payload`:
//! `STATE_SYNC`, `ACTION` and `PLAYER_JOIN`. Vectors travel as `{x, y}`
//! objects and field names are camelCase.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sim::{Abilities, Body, Enemy, EnemyState, EnemyVariant, Platform, Player, SimulationState};

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Action '{action}' is missing field '{field}'")]
    MissingField { action: String, field: &'static str },

    #[error("Enemy '{id}' is invalid: {reason}")]
    InvalidEnemy { id: String, reason: &'static str },

    #[error("Non-finite number in {0}")]
    NonFinite(&'static str),
}

/// Action names understood by both peers
pub const ACTION_SHOOT: &str = "SHOOT";
pub const ACTION_NEXT_ROUND: &str = "NEXT_ROUND";

/// Top-level peer message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerMessage {
    StateSync(StateSync),
    Action(ActionMessage),
    PlayerJoin(PlayerJoin),
}

impl PeerMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Snapshot of the local player, plus the world when this side owns it
    pub fn state_sync(state: &SimulationState) -> Option<Self> {
        let player = state.local_player()?;
        let world = state.authority.owns_world();
        Some(PeerMessage::StateSync(StateSync {
            player: PlayerDto::from(player),
            enemies: world.then(|| state.enemies.iter().map(EnemyDto::from).collect()),
            platforms: world.then(|| state.platforms.clone()),
        }))
    }

    pub fn shoot(vel: Vec2) -> Self {
        PeerMessage::Action(ActionMessage {
            action: ACTION_SHOOT.to_string(),
            data: serde_json::json!({ "vel": WireVec::from(vel) }),
        })
    }

    pub fn next_round(round: u32) -> Self {
        PeerMessage::Action(ActionMessage {
            action: ACTION_NEXT_ROUND.to_string(),
            data: serde_json::json!({ "round": round }),
        })
    }

    pub fn player_join(id: impl Into<String>, name: impl Into<String>) -> Self {
        PeerMessage::PlayerJoin(PlayerJoin {
            id: id.into(),
            name: name.into(),
        })
    }

    /// Short tag for logging
    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::StateSync(_) => "STATE_SYNC",
            PeerMessage::Action(_) => "ACTION",
            PeerMessage::PlayerJoin(_) => "PLAYER_JOIN",
        }
    }
}

/// `{x, y}` vector as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireVec {
    pub x: f32,
    pub y: f32,
}

impl From<Vec2> for WireVec {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<WireVec> for Vec2 {
    fn from(v: WireVec) -> Self {
        Vec2::new(v.x, v.y)
    }
}

impl WireVec {
    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSync {
    pub player: PlayerDto,
    /// Present only when sent by the world authority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enemies: Option<Vec<EnemyDto>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<Platform>>,
}

impl StateSync {
    /// Decode the enemy list into simulation enemies
    ///
    /// A single invalid entry rejects the whole list; the previous enemies
    /// stay in place.
    pub fn decode_enemies(&self) -> Result<Option<Vec<Enemy>>, ProtocolError> {
        self.enemies
            .as_ref()
            .map(|list| list.iter().cloned().map(Enemy::try_from).collect())
            .transpose()
    }

    pub fn decode_platforms(&self) -> Result<Option<Vec<Platform>>, ProtocolError> {
        if let Some(platforms) = &self.platforms {
            let finite = platforms
                .iter()
                .all(|p| p.x.is_finite() && p.y.is_finite() && p.w.is_finite() && p.h.is_finite());
            if !finite {
                return Err(ProtocolError::NonFinite("platforms"));
            }
        }
        Ok(self.platforms.clone())
    }
}

/// Remote player snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDto {
    #[serde(default)]
    pub id: String,
    pub pos: WireVec,
    pub vel: WireVec,
    pub facing: f32,
    pub lives: u32,
    pub abilities: Abilities,
    #[serde(default)]
    pub is_jumping: bool,
    #[serde(default)]
    pub health: i32,
}

impl From<&Player> for PlayerDto {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            pos: player.body.pos.into(),
            vel: player.body.vel.into(),
            facing: player.facing,
            lives: player.lives,
            abilities: player.abilities,
            is_jumping: player.is_jumping,
            health: player.health,
        }
    }
}

impl PlayerDto {
    /// Copy the mirrored fields onto the local copy of the remote player
    pub fn apply_to(&self, player: &mut Player) -> Result<(), ProtocolError> {
        if !self.pos.is_finite() || !self.vel.is_finite() || !self.facing.is_finite() {
            return Err(ProtocolError::NonFinite("player"));
        }
        player.body.pos = self.pos.into();
        player.body.vel = self.vel.into();
        player.facing = if self.facing < 0.0 { -1.0 } else { 1.0 };
        // Lives only ever go down; an eliminated partner stays out
        player.lives = self.lives.min(player.lives);
        player.abilities = self.abilities;
        player.is_jumping = self.is_jumping;
        if player.lives == 0 {
            player.health = 0;
        }
        Ok(())
    }
}

/// Enemy snapshot using the flag encoding peers expect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemyDto {
    pub id: String,
    pub pos: WireVec,
    pub vel: WireVec,
    pub width: f32,
    pub height: f32,
    pub freeze_level: f32,
    pub is_frozen: bool,
    pub is_rolling: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freeze_timer: Option<u32>,
    #[serde(default)]
    pub is_dropping: bool,
    pub hp: i32,
    pub variant: EnemyVariant,
}

impl From<&Enemy> for EnemyDto {
    fn from(enemy: &Enemy) -> Self {
        let freeze_timer = match enemy.state {
            EnemyState::FrozenStatic { thaw_ticks } => Some(thaw_ticks),
            _ => None,
        };
        Self {
            id: enemy.id.clone(),
            pos: enemy.body.pos.into(),
            vel: enemy.body.vel.into(),
            width: enemy.body.width,
            height: enemy.body.height,
            freeze_level: enemy.state.freeze_level(),
            is_frozen: enemy.state.is_frozen(),
            is_rolling: enemy.state.is_rolling(),
            freeze_timer,
            is_dropping: enemy.state.is_dropping(),
            hp: enemy.hp,
            variant: enemy.variant,
        }
    }
}

impl TryFrom<EnemyDto> for Enemy {
    type Error = ProtocolError;

    fn try_from(dto: EnemyDto) -> Result<Self, Self::Error> {
        let invalid = |reason| ProtocolError::InvalidEnemy {
            id: dto.id.clone(),
            reason,
        };
        if dto.is_rolling && !dto.is_frozen {
            return Err(invalid("rolling but not frozen"));
        }
        if !dto.pos.is_finite() || !dto.vel.is_finite() || !dto.freeze_level.is_finite() {
            return Err(ProtocolError::NonFinite("enemies"));
        }
        if !(dto.width >= 0.0 && dto.height >= 0.0) {
            return Err(invalid("negative size"));
        }

        let boss = dto.variant == EnemyVariant::Boss;
        let state = if dto.is_rolling {
            EnemyState::FrozenRolling
        } else if dto.is_frozen {
            let default_thaw = if boss { crate::consts::BOSS_THAW_TICKS } else { crate::consts::THAW_TICKS };
            EnemyState::FrozenStatic {
                thaw_ticks: dto.freeze_timer.unwrap_or(default_thaw).max(1),
            }
        } else {
            EnemyState::Active {
                freeze_level: dto.freeze_level.clamp(0.0, crate::consts::FREEZE_THRESHOLD),
                dropping: dto.is_dropping,
            }
        };

        Ok(Enemy {
            body: Body::new(dto.pos.into(), dto.width, dto.height).with_vel(dto.vel.into()),
            id: dto.id,
            state,
            hp: dto.hp,
            variant: dto.variant,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMessage {
    pub action: String,
    #[serde(default)]
    pub data: Value,
}

/// Decoded `ACTION` payload
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteAction {
    Shoot { vel: Vec2 },
    NextRound { round: u32 },
    /// Unrecognised action name, ignored by receivers
    Unknown(String),
}

impl ActionMessage {
    pub fn parse(&self) -> Result<RemoteAction, ProtocolError> {
        let missing = |field| ProtocolError::MissingField {
            action: self.action.clone(),
            field,
        };
        match self.action.as_str() {
            ACTION_SHOOT => {
                let vel = self.data.get("vel").cloned().ok_or_else(|| missing("vel"))?;
                let vel: WireVec = serde_json::from_value(vel)?;
                if !vel.is_finite() {
                    return Err(ProtocolError::NonFinite("vel"));
                }
                Ok(RemoteAction::Shoot { vel: vel.into() })
            }
            ACTION_NEXT_ROUND => {
                let round = self
                    .data
                    .get("round")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| missing("round"))?;
                Ok(RemoteAction::NextRound {
                    round: u32::try_from(round).unwrap_or(u32::MAX),
                })
            }
            other => Ok(RemoteAction::Unknown(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerJoin {
    pub id: String,
    pub name: String,
}
