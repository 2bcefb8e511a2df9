//! Read-only observer API: runs a scenario on a blocking task and publishes
//! each throttled stats frame over JSON endpoints and server-sent events.

use std::{
    convert::Infallible,
    net::SocketAddr,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::{net::TcpListener, sync::broadcast};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{error, info};

use crate::{
    engine::EngineBuilder,
    render::{visible_instances, RenderInstance},
    scenario::{Scenario, SimulationParams},
    stats::StatsSnapshot,
};

#[derive(Clone, Serialize)]
pub struct UiFrame {
    pub step: u64,
    pub stats: StatsSnapshot,
    pub params: SimulationParams,
    pub completed: bool,
}

#[derive(Clone, Serialize)]
pub struct StateEnvelope {
    pub scenario: String,
    pub total_frames: u64,
    pub frame: Option<UiFrame>,
    pub completed: bool,
}

#[derive(Clone)]
struct AppState {
    broadcaster: broadcast::Sender<String>,
    latest_frame: Arc<Mutex<Option<UiFrame>>>,
    latest_agents: Arc<Mutex<Vec<RenderInstance>>>,
    frames: Arc<Mutex<Vec<UiFrame>>>,
    total_frames: u64,
    scenario_name: String,
    simulation_done: Arc<AtomicBool>,
}

impl AppState {
    fn publish(&self, frame: UiFrame, agents: Option<Vec<RenderInstance>>) {
        *lock(&self.latest_frame) = Some(frame.clone());
        if let Some(agents) = agents {
            *lock(&self.latest_agents) = agents;
        }
        {
            let mut frames = lock(&self.frames);
            match frames.last_mut() {
                Some(last) if last.step == frame.step => *last = frame.clone(),
                _ => frames.push(frame.clone()),
            }
        }
        if let Ok(payload) = serde_json::to_string(&frame) {
            // No subscribers is fine.
            let _ = self.broadcaster.send(payload);
        }
    }
}

pub struct WebServerConfig {
    pub scenario: Scenario,
    pub frames: u64,
    pub snapshot_dir: PathBuf,
    pub host: String,
    pub port: u16,
    /// Sleep for each frame's length so the run unfolds in wall-clock time.
    pub realtime: bool,
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        scenario,
        frames,
        snapshot_dir,
        host,
        port,
        realtime,
    } = config;

    let scenario_name = scenario.name.clone();
    let mut engine = EngineBuilder::from_scenario(&scenario)
        .with_snapshot_dir(snapshot_dir)
        .build();
    let frame_seconds = engine.settings().frame_seconds;

    let (tx, _) = broadcast::channel::<String>(512);
    let state = AppState {
        broadcaster: tx,
        latest_frame: Arc::new(Mutex::new(None)),
        latest_agents: Arc::new(Mutex::new(Vec::new())),
        frames: Arc::new(Mutex::new(Vec::new())),
        total_frames: frames,
        scenario_name: scenario_name.clone(),
        simulation_done: Arc::new(AtomicBool::new(false)),
    };

    let sim_state = state.clone();
    let sim_handle = tokio::task::spawn_blocking(move || -> Result<()> {
        for _ in 0..frames {
            if let Some(stats) = engine.frame(frame_seconds)? {
                let frame = UiFrame {
                    step: engine.current_step(),
                    stats,
                    params: engine.params().clone(),
                    completed: false,
                };
                let agents = visible_instances(engine.world().population());
                sim_state.publish(frame, Some(agents));
            }
            if realtime {
                std::thread::sleep(Duration::from_secs_f64(frame_seconds));
            }
        }

        sim_state.simulation_done.store(true, Ordering::SeqCst);
        let final_frame = UiFrame {
            step: engine.current_step(),
            stats: engine.current_stats(),
            params: engine.params().clone(),
            completed: true,
        };
        let agents = visible_instances(engine.world().population());
        sim_state.publish(final_frame, Some(agents));
        Ok(())
    });

    let label = scenario_name.clone();
    tokio::spawn(async move {
        match sim_handle.await {
            Ok(Ok(())) => info!(scenario = %label, "simulation completed"),
            Ok(Err(err)) => error!(scenario = %label, "simulation error: {err:?}"),
            Err(err) => error!(scenario = %label, "simulation task failed: {err:?}"),
        }
    });

    let router = router(state);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    info!(%addr, scenario = %scenario_name, "observer API listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/frames", get(all_frames))
        .route("/api/agents", get(latest_agents))
        .route("/api/events", get(stream_events))
        .with_state(Arc::new(state))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down observer API");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn latest_state(State(state): State<Arc<AppState>>) -> Json<StateEnvelope> {
    let frame = lock(&state.latest_frame).clone();
    Json(StateEnvelope {
        scenario: state.scenario_name.clone(),
        total_frames: state.total_frames,
        frame,
        completed: state.simulation_done.load(Ordering::SeqCst),
    })
}

#[derive(Serialize)]
struct FramesResponse {
    scenario: String,
    total_frames: u64,
    completed: bool,
    frames: Vec<UiFrame>,
}

async fn all_frames(State(state): State<Arc<AppState>>) -> Json<FramesResponse> {
    let frames = lock(&state.frames).clone();
    Json(FramesResponse {
        scenario: state.scenario_name.clone(),
        total_frames: state.total_frames,
        completed: state.simulation_done.load(Ordering::SeqCst),
        frames,
    })
}

async fn latest_agents(State(state): State<Arc<AppState>>) -> Json<Vec<RenderInstance>> {
    Json(lock(&state.latest_agents).clone())
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}
