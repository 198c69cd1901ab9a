//! Fixed-step game loop
//!
//! Owns the simulation plus the optional co-op session and director task.
//! Each tick runs in a fixed order: drain the peer mailbox, swap in the
//! latest director snapshot, latch one-shot inputs, tick, then broadcast.

use crate::consts::{MAX_SUBSTEPS, SIM_DT};
use crate::director::DirectorTask;
use crate::net::{LinkError, PeerSession, apply_inbox};
use crate::sim::{Authority, GameEvent, GamePhase, SimulationState, StateView, TickInput, tick};

/// Things the shell around the loop should react to
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    PeerJoined { id: String, name: String },
    /// The co-op link is gone; the match continues solo
    ConnectionLost,
    RoundStarted { round: u32 },
    MatchEnded { phase: GamePhase, reason: String, score: u64 },
}

pub struct GameLoop {
    state: SimulationState,
    session: Option<PeerSession>,
    director: Option<DirectorTask>,
    /// Held inputs
    input: TickInput,
    fire_held: bool,
    fire_latched: bool,
    pause_latched: bool,
    accumulator: f32,
    ended: bool,
}

impl GameLoop {
    pub fn new(state: SimulationState) -> Self {
        Self {
            state,
            session: None,
            director: None,
            input: TickInput::default(),
            fire_held: false,
            fire_latched: false,
            pause_latched: false,
            accumulator: 0.0,
            ended: false,
        }
    }

    pub fn with_session(mut self, session: PeerSession) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_director(mut self, director: DirectorTask) -> Self {
        self.director = Some(director);
        self
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn view(&self) -> StateView<'_> {
        self.state.view()
    }

    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(PeerSession::is_open)
    }

    pub fn director_running(&self) -> bool {
        self.director.as_ref().is_some_and(DirectorTask::is_running)
    }

    pub fn is_over(&self) -> bool {
        self.state.phase.is_over()
    }

    /// Update held inputs; fire and pause latch on the press edge only
    pub fn set_input(&mut self, held: TickInput) {
        if held.fire && !self.fire_held {
            self.fire_latched = true;
        }
        self.fire_held = held.fire;
        if held.pause {
            self.pause_latched = true;
        }
        self.input = TickInput {
            fire: false,
            pause: false,
            ..held
        };
    }

    /// Run as many fixed ticks as the elapsed time allows
    pub fn update(&mut self, dt: f32) -> Vec<LoopEvent> {
        let dt = dt.min(0.1);
        self.accumulator += dt;

        let mut events = Vec::new();
        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            events.extend(self.step());
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        events
    }

    /// Run exactly one tick
    pub fn step(&mut self) -> Vec<LoopEvent> {
        let mut events = Vec::new();

        // Network handoff happens only here, never mid-tick
        if let Some(session) = &self.session {
            let applied = apply_inbox(&mut self.state, session.poll());
            if let Some(join) = applied.joined {
                events.push(LoopEvent::PeerJoined {
                    id: join.id,
                    name: join.name,
                });
            }
            if applied.closed {
                self.drop_session(&mut events);
            }
        }

        if let Some(director) = &mut self.director {
            if let Some(config) = director.latest() {
                log::debug!("Director snapshot applied: {:?}", config);
                self.state.director = config;
            }
            director.report_score(self.state.score);
        }

        let input = TickInput {
            fire: std::mem::take(&mut self.fire_latched),
            pause: std::mem::take(&mut self.pause_latched),
            ..self.input.clone()
        };
        tick(&mut self.state, &input);

        if let Some(session) = &self.session {
            match session.broadcast_tick(&self.state) {
                Ok(()) => {}
                Err(LinkError::Closed) => self.drop_session(&mut events),
                Err(e) => log::warn!("Failed to broadcast tick: {}", e),
            }
        }

        for event in &self.state.events {
            if let GameEvent::RoundStarted { round } = event {
                events.push(LoopEvent::RoundStarted { round: *round });
            }
        }

        if self.state.phase.is_over() && !self.ended {
            self.ended = true;
            if let Some(mut director) = self.director.take() {
                director.shutdown();
            }
            events.push(LoopEvent::MatchEnded {
                phase: self.state.phase,
                reason: self.state.outcome.clone().unwrap_or_default(),
                score: self.state.score,
            });
        }
        events
    }

    /// Tear down the director task and the co-op session
    pub fn stop(&mut self) {
        if let Some(mut director) = self.director.take() {
            director.shutdown();
        }
        if let Some(session) = self.session.take() {
            session.close();
        }
    }

    /// Connection loss is terminal: forget the partner and carry on solo
    fn drop_session(&mut self, events: &mut Vec<LoopEvent>) {
        if let Some(session) = self.session.take() {
            log::warn!("Co-op connection lost ({:?}); continuing solo", session.role());
            session.close();
            self.state.players.retain(|p| p.is_local());
            self.state.authority = Authority::Solo;
            events.push(LoopEvent::ConnectionLost);
        }
    }
}

impl Drop for GameLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{BOSS_ROUND, MAX_SUBSTEPS};
    use crate::director::tests::EchoService;
    use crate::net::loopback_pair;
    use std::sync::Arc;
    use std::time::Duration;

    fn quiet_state() -> SimulationState {
        let mut state = SimulationState::new(77);
        state.enemies.clear();
        // Keep the round from clearing
        state.round = 2;
        state.enemies.push(crate::sim::Enemy::standard(
            "far".into(),
            glam::Vec2::new(1200.0, 100.0),
            glam::Vec2::ZERO,
            crate::sim::EnemyVariant::Red,
        ));
        state.enemies[0].state = crate::sim::EnemyState::FrozenStatic { thaw_ticks: 10_000 };
        state
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_accumulator_caps_substeps() {
        let mut game = GameLoop::new(quiet_state());
        game.update(SIM_DT * 3.5);
        assert_eq!(game.state().time_ticks, 3);

        game.update(0.5);
        assert_eq!(game.state().time_ticks, 3 + MAX_SUBSTEPS as u64);
    }

    #[test]
    fn test_fire_is_edge_triggered() {
        let mut game = GameLoop::new(quiet_state());
        game.set_input(TickInput {
            up: true,
            fire: true,
            ..Default::default()
        });
        for _ in 0..10 {
            game.step();
            game.set_input(TickInput {
                up: true,
                fire: true,
                ..Default::default()
            });
        }
        assert_eq!(game.state().projectiles.len(), 1);

        // Release and press again
        game.set_input(TickInput::default());
        game.step();
        game.set_input(TickInput {
            up: true,
            fire: true,
            ..Default::default()
        });
        game.step();
        assert_eq!(game.state().projectiles.len(), 2);
    }

    #[test]
    fn test_pause_is_one_shot() {
        let mut game = GameLoop::new(quiet_state());
        game.set_input(TickInput {
            pause: true,
            ..Default::default()
        });
        game.step();
        assert_eq!(game.state().phase, GamePhase::Paused);
        game.step();
        assert_eq!(game.state().phase, GamePhase::Paused);
    }

    #[test]
    fn test_match_end_is_reported_once() {
        let mut state = SimulationState::new(5);
        state.round = BOSS_ROUND;
        state.enemies.clear();
        let mut game = GameLoop::new(state);

        let events = game.step();
        assert!(matches!(
            events.as_slice(),
            [LoopEvent::MatchEnded { phase: GamePhase::Victory, .. }]
        ));
        assert!(game.is_over());
        assert!(game.step().is_empty());
    }

    #[tokio::test]
    async fn test_coop_loopback_sync() {
        let ((host_link, host_rx), (guest_link, guest_rx)) = loopback_pair();
        let host_session = PeerSession::connect(Authority::Host, host_link, host_rx);
        let guest_session = PeerSession::connect(Authority::Guest, guest_link, guest_rx);
        guest_session.announce("guest", "Guest").unwrap();

        let mut host = GameLoop::new(SimulationState::with_authority(11, Authority::Host))
            .with_session(host_session);
        let mut guest = GameLoop::new(SimulationState::with_authority(12, Authority::Guest))
            .with_session(guest_session);
        settle().await;

        let events = host.step();
        assert!(events.contains(&LoopEvent::PeerJoined {
            id: "guest".into(),
            name: "Guest".into()
        }));
        settle().await;
        guest.step();

        let host_ids: Vec<&str> = host.state().enemies.iter().map(|e| e.id.as_str()).collect();
        let guest_ids: Vec<&str> = guest.state().enemies.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(guest_ids, host_ids);
        assert_eq!(guest.state().platforms, host.state().platforms);
        assert_eq!(guest.state().players[1].body.pos, host.state().players[0].body.pos);

        // Guest shot shows up on the host as a slot-1 projectile
        guest.set_input(TickInput {
            up: true,
            fire: true,
            ..Default::default()
        });
        guest.step();
        settle().await;
        host.step();
        assert!(host.state().projectiles.iter().any(|p| p.fired_by(1)));
    }

    #[tokio::test]
    async fn test_connection_loss_continues_solo() {
        let ((host_link, host_rx), (guest_link, guest_rx)) = loopback_pair();
        let host_session = PeerSession::connect(Authority::Host, host_link, host_rx);
        let guest_session = PeerSession::connect(Authority::Guest, guest_link, guest_rx);
        let host = GameLoop::new(SimulationState::with_authority(11, Authority::Host))
            .with_session(host_session);
        let mut guest = GameLoop::new(SimulationState::with_authority(12, Authority::Guest))
            .with_session(guest_session);

        drop(host);
        settle().await;

        let events = guest.step();
        assert!(events.contains(&LoopEvent::ConnectionLost));
        assert!(!guest.is_connected());
        assert_eq!(guest.state().players.len(), 1);
        assert_eq!(guest.state().authority, Authority::Solo);
    }

    #[tokio::test(start_paused = true)]
    async fn test_director_snapshot_swapped_in() {
        let director = DirectorTask::spawn(Arc::new(EchoService), Duration::from_secs(12));
        let mut game = GameLoop::new(quiet_state()).with_director(director);
        game.step();
        assert_eq!(game.state().director.difficulty, 1.0);

        tokio::time::sleep(Duration::from_secs(13)).await;
        game.step();
        assert_eq!(game.state().director.difficulty, 2.0);

        game.stop();
        assert!(!game.director_running());
    }
}
