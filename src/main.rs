//! Headless runner
//!
//! Plays a match with the built-in bot driving the local player. With
//! `--coop` a host and a guest run side by side over an in-process link.

use std::sync::Arc;

use frostbite::director::{
    DirectorTask, HttpTuningService, OfflineTuningService, TuningService, coach_feedback_or_fallback,
};
use frostbite::net::{PeerSession, loopback_pair};
use frostbite::sim::{Authority, SimulationState, TickInput};
use frostbite::{GameLoop, LoopEvent, Settings};

/// Ticks between cooperative yields to the runtime
const YIELD_EVERY: u64 = 60;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::from_env();
    let coop = std::env::args().skip(1).any(|arg| arg == "--coop");
    log::info!(
        "Starting {} match, seed {}",
        if coop { "co-op" } else { "solo" },
        settings.seed
    );

    if !settings.has_tuning_service() {
        log::info!("No tuning key configured, director runs on fallbacks");
        run(&settings, Arc::new(OfflineTuningService), coop).await;
        return;
    }
    match HttpTuningService::new(settings.tuning_url.clone(), settings.tuning_key.clone(), settings.tuning_timeout()) {
        Ok(service) => run(&settings, Arc::new(service), coop).await,
        Err(e) => {
            log::error!("Failed to build tuning client: {}", e);
            run(&settings, Arc::new(OfflineTuningService), coop).await;
        }
    }
}

async fn run<S: TuningService>(settings: &Settings, service: Arc<S>, coop: bool) {
    let director = DirectorTask::spawn(service.clone(), settings.director_interval());

    let (mut game, mut partner) = if coop {
        let ((host_link, host_rx), (guest_link, guest_rx)) = loopback_pair();
        let host_session = PeerSession::connect(Authority::Host, host_link, host_rx);
        let guest_session = PeerSession::connect(Authority::Guest, guest_link, guest_rx);
        if let Err(e) = guest_session.announce("guest", "Guest") {
            log::warn!("Guest failed to announce itself: {}", e);
        }
        let host = GameLoop::new(SimulationState::with_authority(settings.seed, Authority::Host))
            .with_session(host_session)
            .with_director(director);
        let guest = GameLoop::new(SimulationState::with_authority(
            settings.seed.wrapping_add(1),
            Authority::Guest,
        ))
        .with_session(guest_session);
        (host, Some(guest))
    } else {
        (
            GameLoop::new(SimulationState::new(settings.seed)).with_director(director),
            None,
        )
    };

    let bot = TickInput {
        idle_mode: true,
        ..Default::default()
    };
    let mut outcome = None;
    let mut ticks = 0u64;

    while outcome.is_none() && (settings.max_ticks == 0 || ticks < settings.max_ticks) {
        game.set_input(bot.clone());
        for event in game.step() {
            if let Some(ended) = report("host", event) {
                outcome = Some(ended);
            }
        }
        if let Some(guest) = partner.as_mut() {
            guest.set_input(bot.clone());
            for event in guest.step() {
                report("guest", event);
            }
        }

        ticks += 1;
        if coop || ticks % YIELD_EVERY == 0 {
            // Let the link pumps and the director task run
            tokio::task::yield_now().await;
        }
    }

    let state = game.state();
    match outcome {
        Some((reason, score)) => {
            let line = coach_feedback_or_fallback(service.as_ref(), &reason, score).await;
            log::info!("{} Final score {}", reason, score);
            log::info!("Coach: {}", line);
        }
        None => log::info!(
            "Stopped after {} ticks at round {} with score {}",
            ticks,
            state.round,
            state.score
        ),
    }

    game.stop();
    if let Some(mut guest) = partner {
        guest.stop();
    }
}

/// Log a loop event; returns the outcome when the match ended
fn report(side: &str, event: LoopEvent) -> Option<(String, u64)> {
    match event {
        LoopEvent::PeerJoined { id, name } => log::info!("[{}] {} joined as {}", side, name, id),
        LoopEvent::ConnectionLost => log::warn!("[{}] partner disconnected", side),
        LoopEvent::RoundStarted { round } => log::info!("[{}] Round {}", side, round),
        LoopEvent::MatchEnded { phase, reason, score } => {
            log::info!("[{}] Match ended: {:?}", side, phase);
            return Some((reason, score));
        }
    }
    None
}
