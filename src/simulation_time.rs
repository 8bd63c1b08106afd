use crate::core::units::{hours_to_seconds, DAYS_PER_YEAR, HOURS_PER_DAY};
use serde::Deserialize;
use serde_valid::Validate;

/// Years after which a full temperature field snapshot is taken.
const SNAPSHOT_YEARS: [usize; 5] = [1, 10, 20, 30, 40];

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SimulationTime {
    #[validate(minimum = 1)]
    simulation_years: u32,
    #[validate(exclusive_minimum = 0.)]
    time_step_hours: f64,
}

impl SimulationTime {
    pub fn new(simulation_years: u32, time_step_hours: f64) -> Self {
        Self {
            simulation_years,
            time_step_hours,
        }
    }

    pub fn simulation_years(&self) -> u32 {
        self.simulation_years
    }

    pub fn step_in_hours(&self) -> f64 {
        self.time_step_hours
    }

    pub fn step_in_seconds(&self) -> f64 {
        hours_to_seconds(self.time_step_hours)
    }

    /// Number of whole steps that fit into the simulated horizon.
    pub fn total_steps(&self) -> usize {
        let horizon_hours = (self.simulation_years * DAYS_PER_YEAR * HOURS_PER_DAY) as f64;
        (horizon_hours / self.time_step_hours).floor() as usize
    }

    pub fn iter(&self) -> SimulationTimeIterator {
        SimulationTimeIterator {
            current_index: 0,
            simulation_time: *self,
        }
    }
}

impl IntoIterator for SimulationTime {
    type Item = SimulationTimeIteration;
    type IntoIter = SimulationTimeIterator;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Clone, Debug)]
pub struct SimulationTimeIterator {
    current_index: usize,
    simulation_time: SimulationTime,
}

impl SimulationTimeIterator {
    pub fn current_index(&self) -> usize {
        self.current_index
    }
}

/// One step of the march. Steps are numbered from 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationTimeIteration {
    pub index: usize,
    /// Elapsed time at the end of the step, in s
    pub time: f64,
    /// Step length, in s
    pub timestep: f64,
}

impl SimulationTimeIteration {
    /// Label of the snapshot due at the end of this step, if any.
    pub fn snapshot_label(&self) -> Option<String> {
        SNAPSHOT_YEARS
            .iter()
            .any(|years| self.index == years * DAYS_PER_YEAR as usize)
            .then(|| {
                format!(
                    "T_vertex_{:.1}a",
                    self.index as f64 / DAYS_PER_YEAR as f64
                )
            })
    }
}

impl Iterator for SimulationTimeIterator {
    type Item = SimulationTimeIteration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_index >= self.simulation_time.total_steps() {
            return None;
        }
        self.current_index += 1;
        let timestep = self.simulation_time.step_in_seconds();

        Some(SimulationTimeIteration {
            index: self.current_index,
            time: self.current_index as f64 * timestep,
            timestep,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.simulation_time.total_steps() - self.current_index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SimulationTimeIterator {}
