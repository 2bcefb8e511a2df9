#![allow(dead_code)]

use crossover::{Engine, EngineBuilder, EngineSettings, Scenario, SimulationParams};
use crossover::systems::{LifecycleSystem, ReplenishmentSystem};

pub fn quiet_params() -> SimulationParams {
    SimulationParams {
        time_speed: 1.0,
        legal_acceptance_rate: 0.0,
        illegal_success_rate: 0.0,
        tfr_native: 0.0,
        tfr_legal: 0.0,
        tfr_illegal: 0.0,
        initial_natives: 0,
        initial_outsiders: 0,
    }
}

pub fn build_engine(seed: u64, capacity: usize, params: SimulationParams) -> Engine {
    let mut scenario = Scenario::new("test", seed);
    scenario.capacity = capacity;
    EngineBuilder::new(EngineSettings::from_scenario(&scenario), params)
        .with_system(LifecycleSystem::new())
        .with_system(ReplenishmentSystem::new())
        .build()
}
