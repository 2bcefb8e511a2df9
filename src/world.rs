use std::mem;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::scenario::SimulationParams;

pub const DEFAULT_CAPACITY: usize = 10_000;
pub const MOVE_SPEED: f64 = 5.0;

pub const OUTSIDE_MIN_X: f64 = -30.0;
pub const OUTSIDE_MAX_X: f64 = -0.5;
pub const INSIDE_MIN_X: f64 = 0.5;
pub const INSIDE_MAX_X: f64 = 30.0;
pub const Z_MIN: f64 = -20.0;
pub const Z_MAX: f64 = 20.0;

const LIFESPAN_CENTER: f64 = 78.0;
const LIFESPAN_WIDTH: f64 = 30.0;
const MIN_LIFESPAN: f64 = 1.0;
const MAX_LIFESPAN: f64 = 100.0;
/// Initial agents start with ages spread over `[0, 40)` years.
const INITIAL_AGE_SPREAD: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(u64);

impl AgentId {
    pub fn raw(self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Group {
    Native,
    LegalImmigrant,
    IllegalImmigrant,
    Outsider,
}

impl Group {
    pub const ALL: [Group; 4] = [
        Group::Native,
        Group::LegalImmigrant,
        Group::IllegalImmigrant,
        Group::Outsider,
    ];

    /// Everyone except Outsiders lives on the inside of the border.
    pub fn is_inside(self) -> bool {
        !matches!(self, Group::Outsider)
    }

    pub fn region(self) -> Region {
        if self.is_inside() {
            INSIDE_REGION
        } else {
            OUTSIDE_REGION
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Group::Native => "Native",
            Group::LegalImmigrant => "Legal Immigrant",
            Group::IllegalImmigrant => "Illegal Immigrant",
            Group::Outsider => "Outsider",
        }
    }
}

/// Axis-aligned rectangle an agent is confined to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub min_x: f64,
    pub max_x: f64,
    pub min_z: f64,
    pub max_z: f64,
}

pub const OUTSIDE_REGION: Region = Region {
    min_x: OUTSIDE_MIN_X,
    max_x: OUTSIDE_MAX_X,
    min_z: Z_MIN,
    max_z: Z_MAX,
};

pub const INSIDE_REGION: Region = Region {
    min_x: INSIDE_MIN_X,
    max_x: INSIDE_MAX_X,
    min_z: Z_MIN,
    max_z: Z_MAX,
};

impl Region {
    pub fn contains(&self, x: f64, z: f64) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_z..=self.max_z).contains(&z)
    }

    pub fn sample_point<R: Rng + ?Sized>(&self, rng: &mut R) -> (f64, f64) {
        let x = rng.gen::<f64>() * (self.max_x - self.min_x) + self.min_x;
        let z = rng.gen::<f64>() * (self.max_z - self.min_z) + self.min_z;
        (x, z)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub x: f64,
    pub z: f64,
    pub vx: f64,
    pub vz: f64,
    pub group: Group,
    pub age: f64,
    pub lifespan: f64,
    pub visual_scale: f64,
    pub dying: bool,
}

impl Agent {
    /// Agent created by a (re)initialisation: already materialised, mixed age.
    pub fn initial<R: Rng + ?Sized>(id: AgentId, group: Group, rng: &mut R) -> Self {
        let mut agent = Self::fresh(id, group, rng);
        agent.age = rng.gen::<f64>() * INITIAL_AGE_SPREAD;
        agent.visual_scale = 1.0;
        agent
    }

    /// Outsider topping up the pending-entry pool; animates in from scale 0.
    pub fn replenished<R: Rng + ?Sized>(id: AgentId, rng: &mut R) -> Self {
        let mut agent = Self::fresh(id, Group::Outsider, rng);
        agent.age = rng.gen::<f64>() * INITIAL_AGE_SPREAD;
        agent
    }

    pub fn newborn<R: Rng + ?Sized>(id: AgentId, parent: &Agent, rng: &mut R) -> Self {
        let (vx, vz) = random_velocity(rng);
        Self {
            id,
            x: parent.x,
            z: parent.z,
            vx,
            vz,
            group: parent.group,
            age: 0.0,
            lifespan: random_lifespan(rng),
            visual_scale: 0.0,
            dying: false,
        }
    }

    fn fresh<R: Rng + ?Sized>(id: AgentId, group: Group, rng: &mut R) -> Self {
        let (x, z) = group.region().sample_point(rng);
        let (vx, vz) = random_velocity(rng);
        Self {
            id,
            x,
            z,
            vx,
            vz,
            group,
            age: 0.0,
            lifespan: random_lifespan(rng),
            visual_scale: 0.0,
            dying: false,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.dying
    }
}

pub fn random_velocity<R: Rng + ?Sized>(rng: &mut R) -> (f64, f64) {
    let vx = (rng.gen::<f64>() - 0.5) * MOVE_SPEED;
    let vz = (rng.gen::<f64>() - 0.5) * MOVE_SPEED;
    (vx, vz)
}

pub fn random_lifespan<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let raw = LIFESPAN_CENTER + (rng.gen::<f64>() - 0.5) * LIFESPAN_WIDTH;
    raw.clamp(MIN_LIFESPAN, MAX_LIFESPAN)
}

/// Ordered store of every live agent. Insertions past the capacity ceiling
/// are dropped without error.
#[derive(Debug, Clone)]
pub struct Population {
    agents: Vec<Agent>,
    next_id: u64,
    capacity: usize,
    saturated: bool,
}

impl Population {
    pub fn new(capacity: usize) -> Self {
        Self {
            agents: Vec::new(),
            next_id: 1,
            capacity,
            saturated: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.agents.len() >= self.capacity
    }

    pub fn spare_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.agents.len())
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        // Ids are assigned in creation order, which is also storage order.
        self.agents
            .binary_search_by_key(&id, |agent| agent.id)
            .ok()
            .map(|index| &self.agents[index])
    }

    pub fn count_active(&self, group: Group) -> usize {
        self.agents
            .iter()
            .filter(|agent| agent.group == group && agent.is_active())
            .count()
    }

    pub fn allocate_id(&mut self) -> AgentId {
        let id = AgentId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, agent: Agent) -> Option<AgentId> {
        if self.is_full() {
            self.mark_saturated();
            return None;
        }
        let id = agent.id;
        self.agents.push(agent);
        Some(id)
    }

    /// Appends agents in order until the ceiling is hit. Returns how many were dropped.
    pub fn extend(&mut self, agents: impl IntoIterator<Item = Agent>) -> usize {
        let mut dropped = 0;
        for agent in agents {
            if self.insert(agent).is_none() {
                dropped += 1;
            }
        }
        dropped
    }

    pub fn retain(&mut self, keep: impl FnMut(&Agent) -> bool) {
        self.agents.retain(keep);
    }

    /// Hands the agents to a system that rebuilds the next generation.
    pub fn take_agents(&mut self) -> Vec<Agent> {
        mem::take(&mut self.agents)
    }

    pub fn restore_agents(&mut self, agents: Vec<Agent>) {
        self.agents = agents;
        self.agents.truncate(self.capacity);
    }

    /// Records that the ceiling suppressed a spawn. Returns true the first
    /// time this happens since the last reset.
    pub fn mark_saturated(&mut self) -> bool {
        if self.saturated {
            return false;
        }
        self.saturated = true;
        tracing::warn!(
            capacity = self.capacity,
            "population ceiling reached; further spawns are dropped"
        );
        true
    }

    pub fn clear(&mut self) {
        self.agents.clear();
        self.next_id = 1;
        self.saturated = false;
    }
}

/// Running total of simulated years.
#[derive(Debug, Clone, Default)]
pub struct SimulationClock {
    total_years: f64,
}

impl SimulationClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts a real-time delta into simulated years and accumulates them.
    /// Deltas or speeds that would move the clock backwards count as zero.
    pub fn advance(&mut self, delta_seconds: f64, time_speed: f64) -> f64 {
        let step_years = delta_seconds * time_speed;
        let step_years = if step_years.is_finite() && step_years > 0.0 {
            step_years
        } else {
            0.0
        };
        self.total_years += step_years;
        step_years
    }

    pub fn total_years(&self) -> f64 {
        self.total_years
    }

    pub fn reset(&mut self) {
        self.total_years = 0.0;
    }
}

pub struct World {
    step: u64,
    clock: SimulationClock,
    params: SimulationParams,
    pub(crate) population: Population,
}

impl World {
    pub fn new(params: SimulationParams, capacity: usize) -> Self {
        Self {
            step: 0,
            clock: SimulationClock::new(),
            params,
            population: Population::new(capacity),
        }
    }

    /// Discards every agent and the clock, then seeds the initial natives and
    /// outsiders from the current parameters.
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.step = 0;
        self.clock.reset();
        self.population.clear();
        for _ in 0..self.params.initial_natives {
            let id = self.population.allocate_id();
            self.population.insert(Agent::initial(id, Group::Native, rng));
        }
        for _ in 0..self.params.initial_outsiders {
            let id = self.population.allocate_id();
            self.population.insert(Agent::initial(id, Group::Outsider, rng));
        }
        info!(
            natives = self.params.initial_natives,
            outsiders = self.params.initial_outsiders,
            stored = self.population.len(),
            "population initialised"
        );
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn elapsed_years(&self) -> f64 {
        self.clock.total_years()
    }

    pub fn advance_clock(&mut self, delta_seconds: f64) -> f64 {
        self.step += 1;
        self.clock.advance(delta_seconds, self.params.time_speed)
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut SimulationParams {
        &mut self.params
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn population_mut(&mut self) -> &mut Population {
        &mut self.population
    }
}
