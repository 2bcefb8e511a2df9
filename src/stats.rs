//! Demographic statistics derived from the live population.
//!
//! Snapshots are recomputed from scratch on every call and are never fed back
//! into the simulation. The only state kept between calls is the minority
//! crossover marker, which is cleared by a full reset and nothing else.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::world::{Group, Population};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub elapsed_years: f64,
    pub years_passed: u64,
    pub total_inside: usize,
    pub count_native: usize,
    pub count_legal: usize,
    pub count_illegal: usize,
    pub count_outsider: usize,
    pub percent_native: f64,
    pub percent_legal: f64,
    pub percent_illegal: f64,
    pub minority_year: Option<u64>,
}

impl StatsSnapshot {
    pub fn count(&self, group: Group) -> usize {
        match group {
            Group::Native => self.count_native,
            Group::LegalImmigrant => self.count_legal,
            Group::IllegalImmigrant => self.count_illegal,
            Group::Outsider => self.count_outsider,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    minority_year: Option<u64>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn minority_year(&self) -> Option<u64> {
        self.minority_year
    }

    /// Computes a snapshot and latches the minority crossover the first time
    /// natives fall below half of the inside population.
    pub fn aggregate(&mut self, population: &Population, elapsed_years: f64) -> StatsSnapshot {
        let mut snapshot = self.snapshot(population, elapsed_years);
        if self.minority_year.is_none()
            && snapshot.total_inside > 0
            && snapshot.percent_native < 50.0
        {
            let year = floor_years(elapsed_years);
            self.minority_year = Some(year);
            snapshot.minority_year = Some(year);
            info!(
                year,
                percent_native = snapshot.percent_native,
                total_inside = snapshot.total_inside,
                "natives became a minority"
            );
        }
        snapshot
    }

    /// Same figures as [`aggregate`](Self::aggregate) without touching the marker.
    pub fn snapshot(&self, population: &Population, elapsed_years: f64) -> StatsSnapshot {
        let mut counts = [0usize; 4];
        for agent in population.iter().filter(|agent| agent.is_active()) {
            counts[group_index(agent.group)] += 1;
        }
        let [native, legal, illegal, outsider] = counts;
        let total_inside = native + legal + illegal;

        StatsSnapshot {
            elapsed_years,
            years_passed: floor_years(elapsed_years),
            total_inside,
            count_native: native,
            count_legal: legal,
            count_illegal: illegal,
            count_outsider: outsider,
            percent_native: percent(native, total_inside),
            percent_legal: percent(legal, total_inside),
            percent_illegal: percent(illegal, total_inside),
            minority_year: self.minority_year,
        }
    }

    pub fn reset(&mut self) {
        self.minority_year = None;
    }
}

fn group_index(group: Group) -> usize {
    match group {
        Group::Native => 0,
        Group::LegalImmigrant => 1,
        Group::IllegalImmigrant => 2,
        Group::Outsider => 3,
    }
}

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

fn floor_years(elapsed_years: f64) -> u64 {
    elapsed_years.max(0.0).floor() as u64
}
