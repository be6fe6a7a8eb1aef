pub mod base_law;
pub mod brake;
pub mod holiday;
pub mod inertia;
pub mod pid;
pub mod preboost;
pub mod rate_limit;
pub mod synthesis;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::{Config, InputSourceKind};
use crate::domain::CycleOutcome;
use crate::inputs::{FileSnapshotSource, SnapshotSource};

pub use brake::{BrakeShape, BrakeShaper};
pub use inertia::InertiaEstimator;
pub use pid::{PiController, PiOutput};
pub use preboost::{PreboostError, PreboostOutcome, PreboostScheduler};
pub use rate_limit::{RateLimited, RateLimiter};
pub use synthesis::{ControllerState, Engine};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub controller: Arc<HeatPumpController>,
}

impl AppState {
    pub fn new(cfg: Config) -> Result<Self> {
        let source: Arc<dyn SnapshotSource> = match cfg.controller.source {
            InputSourceKind::File => {
                let path = cfg
                    .controller
                    .snapshot_path
                    .clone()
                    .context("controller.snapshot_path is required for the file source")?;
                Arc::new(FileSnapshotSource::new(path, cfg.controller.output_path.clone()))
            }
            #[cfg(feature = "sim")]
            InputSourceKind::Simulated => Arc::new(crate::inputs::SimulatedHouse::new(
                cfg.simulation.clone(),
                chrono::Utc::now(),
            )),
            #[cfg(not(feature = "sim"))]
            InputSourceKind::Simulated => {
                anyhow::bail!("simulated source requires the `sim` feature")
            }
        };
        Ok(Self::with_source(cfg, source))
    }

    pub fn with_source(cfg: Config, source: Arc<dyn SnapshotSource>) -> Self {
        let controller = Arc::new(HeatPumpController::new(&cfg, source));
        Self { cfg, controller }
    }
}

pub fn spawn_controller_tasks(state: AppState) {
    let controller = state.controller.clone();
    let tick_seconds = state.cfg.controller.tick_seconds;
    tokio::spawn(async move {
        controller.run(tick_seconds).await;
    });
}

/// Runs the engine once per tick against a snapshot source.
///
/// Cycles are strictly sequential; the state lock is held for the whole
/// evaluation.
pub struct HeatPumpController {
    engine: Engine,
    source: Arc<dyn SnapshotSource>,
    state: RwLock<ControllerState>,
    estimator: RwLock<InertiaEstimator>,
    last_outcome: RwLock<Option<CycleOutcome>>,
}

impl HeatPumpController {
    pub fn new(cfg: &Config, source: Arc<dyn SnapshotSource>) -> Self {
        Self {
            engine: Engine::new(cfg.clone()),
            source,
            state: RwLock::new(ControllerState::default()),
            estimator: RwLock::new(InertiaEstimator::new(cfg.inertia.clone())),
            last_outcome: RwLock::new(None),
        }
    }

    pub async fn run(&self, tick_seconds: u64) {
        let mut interval = tokio::time::interval(Duration::from_secs(tick_seconds.max(1)));
        loop {
            interval.tick().await;
            if let Err(e) = self.run_cycle().await {
                warn!(error = %e, "control cycle failed");
            }
        }
    }

    /// Read, evaluate, publish
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let snapshot = self.source.read_snapshot().await.context("reading snapshot")?;

        let outcome = {
            let mut state = self.state.write().await;
            let mut estimator = self.estimator.write().await;
            let outcome = self.engine.evaluate(&snapshot, estimator.value(), &mut state);
            if let (Some(output), Some(indoor), Some(outdoor)) =
                (outcome.output(), snapshot.indoor_temp, snapshot.outdoor_temp)
            {
                estimator.observe(snapshot.timestamp, indoor, outdoor, output.mode.pauses_learning());
            }
            outcome
        };

        match &outcome {
            CycleOutcome::Ready(output) => info!(
                mode = %output.mode,
                synthetic_temp_c = output.synthetic_temperature,
                brake_level = output.brake_level,
                comfort_push = output.comfort_push,
                blocked_reason = %output.blocked_reason,
                "control cycle"
            ),
            CycleOutcome::Unavailable { missing, .. } => {
                warn!(?missing, "control cycle skipped")
            }
        }

        // state has already advanced, so the outcome is recorded even if publishing fails
        *self.last_outcome.write().await = Some(outcome.clone());
        self.source
            .publish(&outcome)
            .await
            .context("publishing outcome")?;
        Ok(outcome)
    }

    pub async fn last_outcome(&self) -> Option<CycleOutcome> {
        self.last_outcome.read().await.clone()
    }

    pub async fn state(&self) -> ControllerState {
        self.state.read().await.clone()
    }

    pub async fn inertia(&self) -> f64 {
        self.estimator.read().await.value()
    }
}
