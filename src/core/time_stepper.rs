use crate::core::borehole_field::BoreholeField;
use crate::core::borehole_source::BoreholeSource;
use crate::core::energy_balance::EnergyBalance;
use crate::core::material_model::{effective_coefficients, MaterialCoefficients};
use crate::core::operator_builder::{OperatorBuilder, StabilityMetrics};
use crate::core::post_processor::{HeatPumpDraw, PostProcessor, SampledTemperature};
use crate::core::power_profile::PowerProfile;
use crate::core::units::joules_to_kilowatt_hours;
use crate::errors::SubterraError;
use crate::fem::FemBackend;
use crate::input::SimulationParameters;
use crate::output_writer::StepWriter;
use crate::progress::{ProgressRecord, ProgressSink, ProgressThrottle};
use crate::simulation_time::{SimulationTime, SimulationTimeIteration};
#[cfg(feature = "indicatif")]
use indicatif::ProgressIterator;
use nalgebra::DVector;
use strum::Display;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum StepperPhase {
    Preparing,
    Stepping { step: usize },
    Finalizing,
    Failed,
}

/// Everything the output collaborator receives for one step. Energies are in kWh per
/// metre of borehole.
#[derive(Clone, Debug, PartialEq)]
pub struct StepRecord {
    pub day: usize,
    pub balance: EnergyBalance,
    /// Not derived by the engine
    pub q_probe: Option<f64>,
    /// Not derived by the engine
    pub e_storage: Option<f64>,
    pub borehole_temperatures: Vec<SampledTemperature>,
    pub electrical_energy: Vec<HeatPumpDraw>,
}

/// Temperature field at the end of the current step and at the end of the previous one.
#[derive(Clone, Debug)]
pub struct TimeStepState {
    current: DVector<f64>,
    previous: DVector<f64>,
}

impl TimeStepState {
    pub fn uniform(num_dofs: usize, temperature: f64) -> Self {
        Self {
            current: DVector::from_element(num_dofs, temperature),
            previous: DVector::from_element(num_dofs, temperature),
        }
    }

    pub fn current(&self) -> &DVector<f64> {
        &self.current
    }

    pub fn previous(&self) -> &DVector<f64> {
        &self.previous
    }

    /// Make the solved field the starting point of the next step.
    fn advance(&mut self) {
        self.previous.copy_from(&self.current);
    }
}

/// Aggregates reported once the run completes. Energies in kWh per metre.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunSummary {
    pub steps: usize,
    pub total_flux_energy: f64,
    pub total_probe_energy: f64,
    pub mean_absolute_residual: f64,
    pub stability: StabilityMetrics,
}

#[derive(Clone, Copy, Debug, Default)]
struct RunTotals {
    steps: usize,
    flux: f64,
    probe: f64,
    absolute_residual: f64,
}

impl RunTotals {
    fn record(&mut self, balance: &EnergyBalance) {
        self.steps += 1;
        self.flux += balance.flux;
        self.probe += balance.probe;
        self.absolute_residual += balance.residual.abs();
    }

    fn summary(&self, stability: StabilityMetrics) -> RunSummary {
        RunSummary {
            steps: self.steps,
            total_flux_energy: joules_to_kilowatt_hours(self.flux),
            total_probe_energy: joules_to_kilowatt_hours(self.probe),
            mean_absolute_residual: if self.steps > 0 {
                joules_to_kilowatt_hours(self.absolute_residual) / self.steps as f64
            } else {
                0.
            },
            stability,
        }
    }
}

/// Marches the temperature field through every step of the horizon.
pub struct TimeStepper<'a, B: FemBackend> {
    backend: &'a B,
    boreholes: &'a BoreholeField,
    profile: &'a PowerProfile,
    simulation_time: SimulationTime,
    coefficients: MaterialCoefficients,
    operator: B::Operator,
    source: BoreholeSource,
    post_processor: PostProcessor,
    stability: StabilityMetrics,
    state: TimeStepState,
    phase: StepperPhase,
    totals: RunTotals,
}

impl<'a, B: FemBackend> TimeStepper<'a, B> {
    /// Derive the material coefficients, build the system operator and the borehole
    /// source. This is the only place the operator is assembled.
    pub fn prepare(
        backend: &'a B,
        parameters: &SimulationParameters,
        boreholes: &'a BoreholeField,
        profile: &'a PowerProfile,
    ) -> Result<Self, SubterraError> {
        let simulation_time = parameters.time;
        let time_step = simulation_time.step_in_seconds();

        let coefficients = effective_coefficients(
            parameters.ground.model_type,
            parameters.ground_properties(),
            parameters.fluid_properties(),
            parameters.ground.porosity,
        )?;

        let (operator, stability) =
            OperatorBuilder::new(coefficients, time_step, parameters.convection())
                .build(backend)?;

        let source = BoreholeSource::new(
            parameters.source_mode,
            boreholes,
            backend,
            parameters.mesh.mesh_fine,
        );
        info!(
            "{} boreholes injected as {}",
            boreholes.len(),
            source.mode()
        );

        Ok(Self {
            backend,
            boreholes,
            profile,
            simulation_time,
            coefficients,
            operator,
            source,
            post_processor: PostProcessor::new(
                parameters.temperature_hot,
                parameters.power.efficiency,
                time_step,
            ),
            stability,
            state: TimeStepState::uniform(backend.num_dofs(), parameters.ground.temperature),
            phase: StepperPhase::Preparing,
            totals: Default::default(),
        })
    }

    pub fn phase(&self) -> StepperPhase {
        self.phase
    }

    pub fn state(&self) -> &TimeStepState {
        &self.state
    }

    pub fn coefficients(&self) -> MaterialCoefficients {
        self.coefficients
    }

    pub fn stability(&self) -> StabilityMetrics {
        self.stability
    }

    /// Run every step, then close the writer. Any failure leaves the stepper `Failed`.
    pub fn run(
        &mut self,
        writer: &mut impl StepWriter,
        progress: &mut impl ProgressSink,
    ) -> Result<RunSummary, SubterraError> {
        let result = self.march(writer, progress);
        if result.is_err() {
            self.phase = StepperPhase::Failed;
        }
        result
    }

    fn march(
        &mut self,
        writer: &mut impl StepWriter,
        progress: &mut impl ProgressSink,
    ) -> Result<RunSummary, SubterraError> {
        let total_steps = self.simulation_time.total_steps();
        let mut throttle = ProgressThrottle::new(total_steps);
        let geometry = self.backend.snapshot_geometry();

        // Loop over each timestep
        #[cfg(feature = "indicatif")]
        let simulation_time_iter = self.simulation_time.iter().progress();
        #[cfg(not(feature = "indicatif"))]
        let simulation_time_iter = self.simulation_time.iter();

        for t_it in simulation_time_iter {
            self.phase = StepperPhase::Stepping { step: t_it.index };
            if throttle.is_due(t_it.index) {
                progress.report(&ProgressRecord::new(
                    self.phase,
                    t_it.index,
                    total_steps,
                    format!("Step {}/{}", t_it.index, total_steps),
                ));
            }

            let record = self.step(&t_it)?;
            writer
                .append_step(&record)
                .map_err(SubterraError::Output)?;

            self.state.advance();

            if let Some(label) = t_it.snapshot_label() {
                writer
                    .append_snapshot(&label, self.state.current(), &geometry)
                    .map_err(SubterraError::Output)?;
                info!("Snapshot {label} written");
            }
        }

        self.phase = StepperPhase::Finalizing;
        writer.close().map_err(SubterraError::Output)?;

        let summary = self.totals.summary(self.stability);
        progress.report(&ProgressRecord::new(
            self.phase,
            total_steps,
            total_steps,
            "Simulation finished",
        ));
        info!(
            "Calculation finished after {} steps: boundary flux {:.2} kWh m⁻¹, probes {:.2} kWh m⁻¹, mean |residual| {:.3e} kWh m⁻¹",
            summary.steps,
            summary.total_flux_energy,
            summary.total_probe_energy,
            summary.mean_absolute_residual
        );

        Ok(summary)
    }

    fn step(&mut self, t_it: &SimulationTimeIteration) -> Result<StepRecord, SubterraError> {
        let demand = self.profile.demand_at(t_it.index)?;
        let q = demand * t_it.timestep / self.coefficients.heat_capacity_density();

        let mut rhs = self.backend.assemble_mass_action(&self.state.previous);
        self.source.inject(q).accumulate_into(self.backend, &mut rhs);
        self.backend.apply_boundary_to_rhs(&mut rhs);

        self.backend
            .solve(&self.operator, &rhs, &mut self.state.current)?;

        let boundary_flux = self
            .backend
            .boundary_flux_integral(&self.state.current, self.coefficients.thermal_conductivity());
        let readings =
            self.post_processor
                .process(self.backend, &self.state.current, self.boreholes, demand);

        let balance = EnergyBalance::compute(
            self.backend,
            self.coefficients.heat_capacity_density(),
            &self.state.previous,
            &self.state.current,
            boundary_flux,
            t_it.timestep,
            demand,
            self.boreholes.len(),
        );
        self.totals.record(&balance);
        debug!(
            "Step {}: demand {demand:.3} W m⁻¹, residual {:.3e} J",
            t_it.index, balance.residual
        );

        Ok(StepRecord {
            day: t_it.index,
            balance: balance.in_kilowatt_hours(),
            q_probe: None,
            e_storage: None,
            borehole_temperatures: readings.temperatures,
            electrical_energy: readings.draws,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn should_copy_current_into_previous_on_advance() {
        let mut state = TimeStepState::uniform(3, 10.);
        state.current[1] = 12.;

        state.advance();
        state.current[1] = 15.;

        assert_eq!(state.previous()[1], 12.);
        assert_eq!(state.current()[1], 15.);
    }

    #[rstest]
    fn should_name_phases() {
        assert_eq!(StepperPhase::Preparing.to_string(), "preparing");
        assert_eq!(StepperPhase::Stepping { step: 3 }.to_string(), "stepping");
    }

    #[rstest]
    fn should_average_absolute_residuals() {
        let mut totals = RunTotals::default();
        totals.record(&EnergyBalance::new(3.6e6, 0., 3.6e6));
        totals.record(&EnergyBalance::new(-7.2e6, 3.6e6, 0.));

        let summary = totals.summary(StabilityMetrics::Neumann(0.1));

        assert_eq!(summary.steps, 2);
        assert_eq!(summary.total_flux_energy, 1.);
        assert_eq!(summary.total_probe_energy, 1.);
        assert_eq!(summary.mean_absolute_residual, 1.5);
    }
}
