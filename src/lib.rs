#![allow(clippy::too_many_arguments)]

pub mod core;
pub mod errors;
pub mod fem;
pub mod input;
pub mod output;
pub mod output_writer;
pub mod progress;
pub mod simulation_time;
#[cfg(test)]
mod tests;

pub use crate::core::time_stepper::RunSummary;
pub use crate::errors::SubterraError;

use crate::core::borehole_field::BoreholeField;
use crate::core::power_profile::PowerProfile;
use crate::core::time_stepper::{StepperPhase, TimeStepper};
use crate::fem::structured::{StructuredBackend, StructuredMesh};
use crate::input::{ingest, SimulationParameters};
use crate::output::Output;
use crate::output_writer::CsvStepWriter;
use crate::progress::{ProgressRecord, ProgressSink};
use std::io::Read;
use tracing::info;

/// Location key of the exported power profile.
pub const POWER_PROFILE_KEY: &str = "powerprofile_multi";

/// Run a simulation from a JSON parameter file, with boreholes laid out as configured.
pub fn run_project(
    input: impl Read,
    output: &impl Output,
    progress: &mut impl ProgressSink,
) -> Result<RunSummary, SubterraError> {
    let parameters = ingest(input)?;
    let boreholes = parameters.borehole_field()?;

    run_simulation(&parameters, &boreholes, output, progress)
}

/// Run a simulation for an explicit borehole field.
pub fn run_simulation(
    parameters: &SimulationParameters,
    boreholes: &BoreholeField,
    output: &impl Output,
    progress: &mut impl ProgressSink,
) -> Result<RunSummary, SubterraError> {
    progress.report(&ProgressRecord::new(
        StepperPhase::Preparing,
        0,
        1,
        "Preparing simulation",
    ));
    info!(
        "Starting simulation of {} boreholes ({}) over {} years in {} h steps",
        boreholes.len(),
        parameters.mesh_mode,
        parameters.time.simulation_years(),
        parameters.time.step_in_hours()
    );

    let profile = PowerProfile::tile(
        parameters.time.simulation_years(),
        parameters.power.coefficient_a,
        parameters.power.coefficient_b,
    );
    if !output.is_noop() {
        profile
            .write_csv(
                output
                    .writer_for_location_key(POWER_PROFILE_KEY)
                    .map_err(SubterraError::Output)?,
            )
            .map_err(SubterraError::Output)?;
    }

    let mesh = StructuredMesh::graded(
        parameters.field_centre(),
        parameters.mesh.x_length,
        parameters.mesh.y_length,
        &boreholes.location_vec(),
        &parameters.mesh_sizing(),
    )
    .map_err(SubterraError::configuration)?;
    let backend = StructuredBackend::new(mesh, parameters.ground.temperature);

    let mut stepper = TimeStepper::prepare(&backend, parameters, boreholes, &profile)?;
    let mut writer = CsvStepWriter::new(output, boreholes).map_err(SubterraError::Output)?;

    stepper.run(&mut writer, progress)
}
