use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info};

use crate::{
    rng::{RngManager, SystemRng},
    scenario::{Scenario, SimulationParams},
    snapshot::SnapshotWriter,
    stats::{StatsAggregator, StatsSnapshot},
    systems::{LifecycleSystem, ReplenishmentSystem},
    world::World,
};

const INIT_STREAM: &str = "init";

pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
    pub capacity: usize,
    /// Real seconds fed to each step by [`Engine::run`].
    pub frame_seconds: f64,
    pub stats_interval_seconds: f64,
    pub snapshot_interval_steps: u64,
    pub snapshot_dir: PathBuf,
}

impl EngineSettings {
    pub fn from_scenario(scenario: &Scenario) -> Self {
        Self {
            scenario_name: scenario.name.clone(),
            seed: scenario.seed,
            capacity: scenario.capacity,
            frame_seconds: scenario.frame_seconds,
            stats_interval_seconds: scenario.stats_interval_seconds,
            snapshot_interval_steps: scenario.snapshot_interval_steps,
            snapshot_dir: PathBuf::from("snapshots"),
        }
    }

    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = dir.into();
        self
    }
}

pub struct EngineBuilder {
    settings: EngineSettings,
    params: SimulationParams,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings, params: SimulationParams) -> Self {
        Self {
            settings,
            params,
            systems: Vec::new(),
        }
    }

    /// Builder preloaded with the lifecycle pass followed by replenishment.
    pub fn from_scenario(scenario: &Scenario) -> Self {
        Self::new(EngineSettings::from_scenario(scenario), scenario.params.clone())
            .with_system(LifecycleSystem::new())
            .with_system(ReplenishmentSystem::new())
    }

    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings.snapshot_dir = dir.into();
        self
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn push_system(&mut self, system: impl System + 'static) {
        self.systems.push(Box::new(system));
    }

    pub fn build(self) -> Engine {
        let mut rng = RngManager::new(self.settings.seed);
        let mut world = World::new(self.params, self.settings.capacity);
        world.reset(&mut rng.stream(INIT_STREAM));
        Engine {
            world,
            rng,
            systems: self.systems,
            aggregator: StatsAggregator::new(),
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_steps,
            ),
            settings: self.settings,
            paused: false,
            stats_timer: 0.0,
        }
    }
}

/// Outcome of a single step.
#[derive(Clone, Debug)]
pub struct StepReport {
    pub step: u64,
    pub delta_seconds: f64,
    pub step_years: f64,
    pub elapsed_years: f64,
    pub population: usize,
    pub snapshot_path: Option<PathBuf>,
}

pub struct Engine {
    world: World,
    rng: RngManager,
    systems: Vec<Box<dyn System>>,
    aggregator: StatsAggregator,
    snapshot_writer: SnapshotWriter,
    settings: EngineSettings,
    paused: bool,
    stats_timer: f64,
}

impl Engine {
    /// Advances the simulation by one step of `delta_seconds` real time,
    /// running every system in registration order.
    pub fn step(&mut self, delta_seconds: f64) -> Result<StepReport> {
        let delta_seconds = if delta_seconds.is_finite() && delta_seconds > 0.0 {
            delta_seconds
        } else {
            0.0
        };
        let step_years = self.world.advance_clock(delta_seconds);
        let ctx = SystemContext {
            step: self.world.step(),
            delta_seconds,
            step_years,
            params: self.world.params().clone(),
        };
        for system in &mut self.systems {
            let mut rng_stream = self.rng.stream(system.name());
            system.run(&ctx, &mut self.world, &mut rng_stream)?;
        }

        let snapshot_path = if self.snapshot_writer.is_due(ctx.step) {
            let stats = self.current_stats();
            self.snapshot_writer.maybe_write(
                ctx.step,
                &self.settings.scenario_name,
                &stats,
                self.world.params(),
            )?
        } else {
            None
        };

        debug!(
            step = ctx.step,
            step_years,
            elapsed_years = self.world.elapsed_years(),
            population = self.world.population().len(),
            "step complete"
        );

        Ok(StepReport {
            step: ctx.step,
            delta_seconds,
            step_years,
            elapsed_years: self.world.elapsed_years(),
            population: self.world.population().len(),
            snapshot_path,
        })
    }

    /// One driver frame: steps unless paused, and hands back a stats snapshot
    /// whenever the throttle interval has elapsed.
    pub fn frame(&mut self, delta_seconds: f64) -> Result<Option<StatsSnapshot>> {
        if self.paused {
            return Ok(None);
        }
        self.step(delta_seconds)?;
        if delta_seconds.is_finite() && delta_seconds > 0.0 {
            self.stats_timer += delta_seconds;
        }
        if self.stats_timer > self.settings.stats_interval_seconds {
            self.stats_timer = 0.0;
            return Ok(Some(self.current_stats()));
        }
        Ok(None)
    }

    /// Runs `frames` frames of the configured frame length.
    pub fn run(&mut self, frames: u64) -> Result<()> {
        self.run_with_hook(frames, |_, _| {})
    }

    /// Like [`run`](Self::run), calling `hook` with every throttled snapshot.
    pub fn run_with_hook<F>(&mut self, frames: u64, mut hook: F) -> Result<()>
    where
        F: FnMut(StatsSnapshot, &World),
    {
        for _ in 0..frames {
            if let Some(stats) = self.frame(self.settings.frame_seconds)? {
                hook(stats, &self.world);
            }
        }
        Ok(())
    }

    /// Aggregates the live population, latching the minority crossover if
    /// this is the first time it shows.
    pub fn current_stats(&mut self) -> StatsSnapshot {
        self.aggregator
            .aggregate(self.world.population(), self.world.elapsed_years())
    }

    /// Read-only variant of [`current_stats`](Self::current_stats).
    pub fn peek_stats(&self) -> StatsSnapshot {
        self.aggregator
            .snapshot(self.world.population(), self.world.elapsed_years())
    }

    /// Throws away the population, clock and crossover marker and seeds a new
    /// run from the current parameters.
    pub fn reset(&mut self) {
        self.world.reset(&mut self.rng.stream(INIT_STREAM));
        self.aggregator.reset();
        self.stats_timer = 0.0;
        info!(scenario = %self.settings.scenario_name, "simulation reset");
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn params(&self) -> &SimulationParams {
        self.world.params()
    }

    /// Changes apply from the next step on.
    pub fn params_mut(&mut self) -> &mut SimulationParams {
        self.world.params_mut()
    }

    pub fn set_params(&mut self, params: SimulationParams) {
        *self.world.params_mut() = params;
    }

    pub fn current_step(&self) -> u64 {
        self.world.step()
    }

    pub fn scenario_name(&self) -> &str {
        &self.settings.scenario_name
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn world(&self) -> &World {
        &self.world
    }
}

pub struct SystemContext {
    pub step: u64,
    pub delta_seconds: f64,
    pub step_years: f64,
    pub params: SimulationParams,
}

pub trait System: Send {
    fn name(&self) -> &str;
    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()>;
}
