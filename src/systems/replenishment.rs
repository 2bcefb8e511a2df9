use anyhow::Result;
use tracing::debug;

use crate::{
    engine::{System, SystemContext},
    rng::SystemRng,
    world::{Agent, Group, World},
};

/// Tops the outsider pool back up to `initial_outsiders` after each step.
///
/// Only non-dying outsiders count toward the target, while dying ones keep
/// holding a slot until their fade-out ends. Close to the ceiling this lets
/// the pool overshoot its target for a few steps.
pub struct ReplenishmentSystem;

impl ReplenishmentSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ReplenishmentSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ReplenishmentSystem {
    fn name(&self) -> &str {
        "replenishment"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let target = ctx.params.initial_outsiders;
        let population = world.population_mut();
        let active = population.count_active(Group::Outsider);
        let deficit = target.saturating_sub(active);
        if deficit == 0 {
            return Ok(());
        }

        let spawned = deficit.min(population.spare_capacity());
        for _ in 0..spawned {
            let id = population.allocate_id();
            population.insert(Agent::replenished(id, rng));
        }
        if spawned < deficit {
            population.mark_saturated();
        }

        debug!(
            step = ctx.step,
            target,
            active,
            spawned,
            "outsider pool replenished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{rng::RngManager, scenario::SimulationParams};

    fn params(outsiders: usize) -> SimulationParams {
        SimulationParams {
            initial_natives: 0,
            initial_outsiders: outsiders,
            ..SimulationParams::default()
        }
    }

    fn context(params: SimulationParams) -> SystemContext {
        SystemContext {
            step: 1,
            delta_seconds: 0.1,
            step_years: 0.1,
            params,
        }
    }

    fn run(world: &mut World, ctx: &SystemContext, rng: &mut RngManager) {
        ReplenishmentSystem::new()
            .run(ctx, world, &mut rng.stream("replenishment"))
            .unwrap();
    }

    #[test]
    fn fills_the_pool_to_target_with_fading_in_agents() {
        let params = params(25);
        let mut world = World::new(params.clone(), 100);
        let mut rng = RngManager::new(1);
        run(&mut world, &context(params), &mut rng);

        let population = world.population();
        assert_eq!(population.count_active(Group::Outsider), 25);
        assert!(population.iter().all(|agent| agent.visual_scale == 0.0));
    }

    #[test]
    fn stops_at_capacity() {
        let params = params(50);
        let mut world = World::new(params.clone(), 20);
        let mut rng = RngManager::new(2);
        run(&mut world, &context(params), &mut rng);
        assert_eq!(world.population().len(), 20);
    }

    #[test]
    fn dying_outsiders_do_not_count_toward_target() {
        let params = params(10);
        let mut world = World::new(params.clone(), 100);
        let mut rng = RngManager::new(3);
        world.reset(&mut rng.stream("init"));
        let population = world.population_mut();
        let mut agents = population.take_agents();
        for agent in agents.iter_mut().take(4) {
            agent.dying = true;
        }
        population.restore_agents(agents);

        run(&mut world, &context(params), &mut rng);
        let population = world.population();
        assert_eq!(population.count_active(Group::Outsider), 10);
        // The four fading agents still hold their slots.
        assert_eq!(population.len(), 14);
    }

    #[test]
    fn surplus_outsiders_are_left_alone() {
        let mut world = World::new(params(10), 100);
        let mut rng = RngManager::new(4);
        world.reset(&mut rng.stream("init"));
        run(&mut world, &context(params(3)), &mut rng);
        assert_eq!(world.population().len(), 10);
    }
}
