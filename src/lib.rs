pub mod engine;
pub mod render;
pub mod rng;
pub mod scenario;
pub mod snapshot;
pub mod stats;
pub mod systems;
pub mod web;
pub mod world;

pub use engine::{Engine, EngineBuilder, EngineSettings, StepReport};
pub use scenario::{Scenario, SimulationParams};
pub use stats::StatsSnapshot;
pub use world::{Agent, AgentId, Group, Population, World};
