use anyhow::Result;
use rand::Rng;
use tracing::debug;

use crate::{
    engine::{System, SystemContext},
    rng::SystemRng,
    scenario::SimulationParams,
    world::{Agent, Group, World, INSIDE_MIN_X},
};

/// Scale units per real second for both fade-in and fade-out.
pub const ANIMATION_RATE: f64 = 2.0;
pub const FERTILE_AGE_MIN: f64 = 18.0;
pub const FERTILE_AGE_MAX: f64 = 50.0;
/// Span over which a couple's TFR is spread.
pub const REPRODUCTIVE_YEARS: f64 = 30.0;

const LEGAL_ENTRY_OFFSET: f64 = 1.0;
const ILLEGAL_ENTRY_SPREAD: f64 = 5.0;

/// Per-step probabilities. Deliberately unclamped: anything >= 1 always
/// succeeds against a draw in `[0, 1)` and anything <= 0 never does.
#[derive(Debug, Clone, Copy)]
struct StepOdds {
    birth_native: f64,
    birth_legal: f64,
    birth_illegal: f64,
    legal_entry: f64,
    illegal_entry: f64,
}

impl StepOdds {
    fn new(params: &SimulationParams, step_years: f64) -> Self {
        let birth = |tfr: f64| tfr / 2.0 / REPRODUCTIVE_YEARS * step_years;
        Self {
            birth_native: birth(params.tfr_native),
            birth_legal: birth(params.tfr_legal),
            birth_illegal: birth(params.tfr_illegal),
            legal_entry: params.legal_acceptance_rate / 100.0 * step_years,
            illegal_entry: params.illegal_success_rate / 100.0 * step_years,
        }
    }

    fn birth(&self, group: Group) -> Option<f64> {
        match group {
            Group::Native => Some(self.birth_native),
            Group::LegalImmigrant => Some(self.birth_legal),
            Group::IllegalImmigrant => Some(self.birth_illegal),
            Group::Outsider => None,
        }
    }
}

/// Advances every agent through animation, movement, aging, birth and
/// immigration, in that order.
pub struct LifecycleSystem;

impl LifecycleSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LifecycleSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for LifecycleSystem {
    fn name(&self) -> &str {
        "lifecycle"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let odds = StepOdds::new(&ctx.params, ctx.step_years);
        let population = world.population_mut();
        let capacity = population.capacity();
        let agents = population.take_agents();
        let start_len = agents.len();

        let mut next = Vec::with_capacity(start_len);
        let mut newborns = Vec::new();
        let mut despawned = 0usize;
        let mut admitted = 0usize;
        let mut births_blocked = false;

        for mut agent in agents {
            if !animate(&mut agent, ctx.delta_seconds) {
                despawned += 1;
                continue;
            }
            move_within_region(&mut agent, ctx.delta_seconds);
            grow_older(&mut agent, ctx.step_years);

            if agent.is_active() && is_fertile(agent.age) {
                if start_len + newborns.len() < capacity {
                    if let Some(p) = odds.birth(agent.group) {
                        if bernoulli(rng, p) {
                            let id = population.allocate_id();
                            newborns.push(Agent::newborn(id, &agent, rng));
                        }
                    }
                } else {
                    births_blocked = true;
                }
            }

            if agent.is_active()
                && agent.group == Group::Outsider
                && try_admit(&mut agent, &odds, rng)
            {
                admitted += 1;
            }

            next.push(agent);
        }

        let births = newborns.len();
        population.restore_agents(next);
        population.extend(newborns);
        if births_blocked {
            population.mark_saturated();
        }

        debug!(
            step = ctx.step,
            births,
            admitted,
            despawned,
            population = population.len(),
            "lifecycle pass complete"
        );
        Ok(())
    }
}

/// Fades the agent in or out. Returns false once a dying agent has fully
/// disappeared and should be dropped.
fn animate(agent: &mut Agent, delta_seconds: f64) -> bool {
    let change = ANIMATION_RATE * delta_seconds;
    if agent.dying {
        agent.visual_scale -= change;
        if agent.visual_scale <= 0.0 {
            return false;
        }
    } else if agent.visual_scale < 1.0 {
        agent.visual_scale = (agent.visual_scale + change).min(1.0);
    }
    true
}

fn move_within_region(agent: &mut Agent, delta_seconds: f64) {
    let region = agent.group.region();
    let (x, vx) = reflect(
        agent.x + agent.vx * delta_seconds,
        agent.vx,
        region.min_x,
        region.max_x,
    );
    let (z, vz) = reflect(
        agent.z + agent.vz * delta_seconds,
        agent.vz,
        region.min_z,
        region.max_z,
    );
    agent.x = x;
    agent.z = z;
    agent.vx = vx;
    agent.vz = vz;
}

/// Clamps a coordinate into `[min, max]`, flipping the velocity if it left.
fn reflect(position: f64, velocity: f64, min: f64, max: f64) -> (f64, f64) {
    if position < min || position > max {
        (position.clamp(min, max), -velocity)
    } else {
        (position, velocity)
    }
}

fn grow_older(agent: &mut Agent, step_years: f64) {
    if agent.dying {
        return;
    }
    agent.age += step_years;
    if agent.age >= agent.lifespan {
        agent.dying = true;
    }
}

fn is_fertile(age: f64) -> bool {
    (FERTILE_AGE_MIN..FERTILE_AGE_MAX).contains(&age)
}

/// Legal admission is tried first; the illegal route only gets a draw when
/// the legal one failed.
fn try_admit<R: Rng + ?Sized>(agent: &mut Agent, odds: &StepOdds, rng: &mut R) -> bool {
    if bernoulli(rng, odds.legal_entry) {
        agent.group = Group::LegalImmigrant;
        agent.x = INSIDE_MIN_X + LEGAL_ENTRY_OFFSET;
        true
    } else if bernoulli(rng, odds.illegal_entry) {
        agent.group = Group::IllegalImmigrant;
        agent.x = INSIDE_MIN_X + rng.gen::<f64>() * ILLEGAL_ENTRY_SPREAD;
        true
    } else {
        false
    }
}

fn bernoulli<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    rng.gen::<f64>() < probability
}
