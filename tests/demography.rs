mod common;

use std::collections::HashMap;

use crossover::{
    engine::{System, SystemContext},
    rng::RngManager,
    systems::ReplenishmentSystem,
    AgentId, Group, SimulationParams, World,
};

use common::{build_engine, quiet_params};

#[test]
fn closed_border_keeps_outsider_pool_and_never_grows_inside() {
    let params = SimulationParams {
        time_speed: 10.0,
        initial_natives: 100,
        initial_outsiders: 50,
        ..quiet_params()
    };
    let mut engine = build_engine(31, 10_000, params);
    let mut previous_inside = engine.current_stats().total_inside;
    assert_eq!(previous_inside, 100);

    for _ in 0..150 {
        engine.step(0.1).unwrap();
        let stats = engine.current_stats();
        assert_eq!(stats.count_outsider, 50);
        assert!(stats.total_inside <= 100);
        assert!(stats.total_inside <= previous_inside);
        assert_eq!(stats.count_legal + stats.count_illegal, 0);
        previous_inside = stats.total_inside;
    }
    // 150 simulated years outlive every lifespan.
    assert_eq!(previous_inside, 0);
}

#[test]
fn certain_admission_moves_every_outsider_in_one_step() {
    let params = SimulationParams {
        legal_acceptance_rate: 100.0,
        initial_natives: 0,
        initial_outsiders: 100,
        ..quiet_params()
    };
    let mut engine = build_engine(5, 10_000, params);
    let report = engine.step(1.0).unwrap();
    assert_eq!(report.step_years, 1.0);

    let stats = engine.current_stats();
    assert_eq!(stats.count_legal, 100);
    assert_eq!(stats.total_inside, 100);
    assert_eq!(stats.percent_native, 0.0);
    assert_eq!(stats.minority_year, Some(1));

    let legal_ids: Vec<AgentId> = engine
        .world()
        .population()
        .iter()
        .filter(|agent| agent.group == Group::LegalImmigrant)
        .map(|agent| agent.id)
        .collect();
    assert_eq!(legal_ids.len(), 100);
    assert!(legal_ids.iter().all(|id| id.raw() <= 100));
    // The pool was topped back up behind them.
    assert_eq!(stats.count_outsider, 100);
}

#[test]
fn group_changes_only_go_from_outsider_to_admitted() {
    let params = SimulationParams {
        time_speed: 4.0,
        legal_acceptance_rate: 20.0,
        illegal_success_rate: 15.0,
        tfr_native: 1.5,
        tfr_legal: 2.1,
        tfr_illegal: 3.0,
        initial_natives: 80,
        initial_outsiders: 60,
    };
    let mut engine = build_engine(77, 2_000, params);
    let mut seen: HashMap<AgentId, Group> = HashMap::new();

    for _ in 0..300 {
        engine.step(0.05).unwrap();
        for agent in engine.world().population().iter() {
            if let Some(previous) = seen.insert(agent.id, agent.group) {
                if previous != agent.group {
                    assert_eq!(previous, Group::Outsider);
                    assert!(matches!(
                        agent.group,
                        Group::LegalImmigrant | Group::IllegalImmigrant
                    ));
                }
            }
        }
    }
    assert!(seen.values().any(|group| *group == Group::LegalImmigrant));
}

#[test]
fn minority_year_latches_at_first_crossing() {
    let params = SimulationParams {
        time_speed: 5.0,
        legal_acceptance_rate: 50.0,
        illegal_success_rate: 0.0,
        initial_natives: 50,
        initial_outsiders: 200,
        ..quiet_params()
    };
    let mut engine = build_engine(13, 10_000, params);
    let mut latched = None;

    for _ in 0..200 {
        engine.step(0.1).unwrap();
        let stats = engine.current_stats();
        match latched {
            None if stats.total_inside > 0 && stats.percent_native < 50.0 => {
                assert_eq!(stats.minority_year, Some(stats.years_passed));
                latched = stats.minority_year;
            }
            None => assert_eq!(stats.minority_year, None),
            Some(year) => assert_eq!(stats.minority_year, Some(year)),
        }
    }
    assert!(latched.is_some());
}

#[test]
fn reset_clears_the_minority_marker() {
    let params = SimulationParams {
        legal_acceptance_rate: 100.0,
        initial_natives: 10,
        initial_outsiders: 100,
        ..quiet_params()
    };
    let mut engine = build_engine(19, 10_000, params);
    engine.step(1.0).unwrap();
    assert!(engine.current_stats().minority_year.is_some());

    engine.reset();
    let stats = engine.current_stats();
    assert_eq!(stats.minority_year, None);
    assert_eq!(stats.elapsed_years, 0.0);
    assert_eq!(stats.count_native, 10);
    assert_eq!(stats.count_outsider, 100);
}

#[test]
fn parameter_changes_apply_from_next_step() {
    let params = SimulationParams {
        initial_natives: 0,
        initial_outsiders: 40,
        ..quiet_params()
    };
    let mut engine = build_engine(3, 10_000, params);
    engine.step(1.0).unwrap();
    assert_eq!(engine.current_stats().count_legal, 0);

    engine.params_mut().legal_acceptance_rate = 100.0;
    engine.step(1.0).unwrap();
    assert_eq!(engine.current_stats().count_legal, 40);
}

#[test]
fn pause_leaves_state_untouched() {
    let params = SimulationParams {
        time_speed: 3.0,
        legal_acceptance_rate: 30.0,
        tfr_native: 2.0,
        initial_natives: 40,
        initial_outsiders: 40,
        ..quiet_params()
    };
    let mut engine = build_engine(8, 10_000, params);
    for _ in 0..10 {
        engine.frame(0.1).unwrap();
    }
    engine.set_paused(true);
    let agents = engine.world().population().agents().to_vec();
    let stats = engine.peek_stats();
    let step = engine.current_step();

    for _ in 0..25 {
        assert!(engine.frame(0.1).unwrap().is_none());
        assert_eq!(engine.world().population().agents(), agents.as_slice());
        assert_eq!(engine.peek_stats(), stats);
    }
    assert_eq!(engine.current_step(), step);

    engine.set_paused(false);
    engine.frame(0.1).unwrap();
    assert_eq!(engine.current_step(), step + 1);
}

#[test]
fn lingering_dying_outsiders_push_stored_pool_past_target() {
    let params = SimulationParams {
        initial_outsiders: 50,
        ..quiet_params()
    };
    let mut rng = RngManager::new(21);
    let mut world = World::new(params.clone(), 1_000);
    world.reset(&mut rng.stream("init"));

    let population = world.population_mut();
    let mut agents = population.take_agents();
    for agent in agents.iter_mut().take(20) {
        agent.dying = true;
    }
    population.restore_agents(agents);

    let ctx = SystemContext {
        step: 1,
        delta_seconds: 0.0,
        step_years: 0.0,
        params,
    };
    ReplenishmentSystem::new()
        .run(&ctx, &mut world, &mut rng.stream("replenishment"))
        .unwrap();

    let population = world.population();
    let stored_outsiders = population
        .iter()
        .filter(|agent| agent.group == Group::Outsider)
        .count();
    assert_eq!(population.count_active(Group::Outsider), 50);
    // Target is 50 active, but the 20 fading agents still occupy slots.
    assert_eq!(stored_outsiders, 70);
}

#[test]
fn lingering_dying_outsiders_can_starve_the_pool_at_the_ceiling() {
    let params = SimulationParams {
        initial_outsiders: 50,
        ..quiet_params()
    };
    let mut rng = RngManager::new(22);
    let mut world = World::new(params.clone(), 60);
    world.reset(&mut rng.stream("init"));

    let population = world.population_mut();
    let mut agents = population.take_agents();
    for agent in agents.iter_mut().take(20) {
        agent.dying = true;
    }
    population.restore_agents(agents);

    let ctx = SystemContext {
        step: 1,
        delta_seconds: 0.0,
        step_years: 0.0,
        params,
    };
    ReplenishmentSystem::new()
        .run(&ctx, &mut world, &mut rng.stream("replenishment"))
        .unwrap();

    assert_eq!(world.population().len(), 60);
    assert_eq!(world.population().count_active(Group::Outsider), 40);
}
