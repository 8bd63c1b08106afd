use crate::core::borehole_field::BoreholeField;
use crate::core::units::SECONDS_PER_HOUR;
use crate::fem::FemBackend;
use nalgebra::DVector;

/// Ground temperature next to a borehole, averaged over the probe points that fall
/// inside the domain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampledTemperature {
    Available(f64),
    /// Every probe point lies outside the domain
    Undefined,
}

impl SampledTemperature {
    pub fn value(&self) -> Option<f64> {
        match self {
            SampledTemperature::Available(temperature) => Some(*temperature),
            SampledTemperature::Undefined => None,
        }
    }
}

/// Electrical draw of the heat pump serving a borehole over one step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HeatPumpDraw {
    /// Electrical energy in Wh (negative while heat is extracted)
    Active(f64),
    /// No extraction, or the ground is already at the target temperature
    Idle,
}

impl HeatPumpDraw {
    /// The draw as written to the results, with an idle pump drawing nothing.
    pub fn energy(&self) -> f64 {
        match self {
            HeatPumpDraw::Active(energy) => *energy,
            HeatPumpDraw::Idle => 0.,
        }
    }
}

/// Electrical energy needed to lift heat extracted at ground temperature `temperature`
/// to `target_temperature`, for a heat pump of efficiency `efficiency`.
///
/// Arguments:
/// * `demand`             - thermal demand in W, negative for extraction
/// * `temperature`        - ground temperature in K
/// * `target_temperature` - hot-side temperature in K
/// * `time_step`          - step length in seconds
/// * `efficiency`         - heat pump efficiency γ
pub fn heat_pump_draw(
    demand: f64,
    temperature: f64,
    target_temperature: f64,
    time_step: f64,
    efficiency: f64,
) -> HeatPumpDraw {
    if demand < 0. && temperature < target_temperature {
        HeatPumpDraw::Active(
            demand * time_step * (1. - temperature / target_temperature)
                / efficiency
                / SECONDS_PER_HOUR as f64,
        )
    } else {
        HeatPumpDraw::Idle
    }
}

/// Shorthand for [`heat_pump_draw`] returning the written energy value.
pub fn p_el_values(
    demand: f64,
    temperature: f64,
    target_temperature: f64,
    time_step: f64,
    efficiency: f64,
) -> f64 {
    heat_pump_draw(demand, temperature, target_temperature, time_step, efficiency).energy()
}

/// Per-borehole readings after a solve.
#[derive(Clone, Debug, PartialEq)]
pub struct BoreholeReadings {
    pub temperatures: Vec<SampledTemperature>,
    pub draws: Vec<HeatPumpDraw>,
}

#[derive(Clone, Copy, Debug)]
pub struct PostProcessor {
    target_temperature: f64,
    efficiency: f64,
    time_step: f64,
}

impl PostProcessor {
    pub fn new(target_temperature: f64, efficiency: f64, time_step: f64) -> Self {
        Self {
            target_temperature,
            efficiency,
            time_step,
        }
    }

    pub fn sample_temperature<B: FemBackend>(
        backend: &B,
        field: &DVector<f64>,
        boreholes: &BoreholeField,
        location: &nalgebra::Point2<f64>,
    ) -> SampledTemperature {
        let samples: Vec<f64> = boreholes
            .probe_points(location)
            .iter()
            .filter_map(|point| backend.sample_at(field, point))
            .collect();

        if samples.is_empty() {
            SampledTemperature::Undefined
        } else {
            SampledTemperature::Available(samples.iter().sum::<f64>() / samples.len() as f64)
        }
    }

    /// Sample every borehole and derive its heat pump draw for the step's demand.
    /// A borehole without a defined temperature draws nothing.
    pub fn process<B: FemBackend>(
        &self,
        backend: &B,
        field: &DVector<f64>,
        boreholes: &BoreholeField,
        demand: f64,
    ) -> BoreholeReadings {
        let temperatures: Vec<SampledTemperature> = boreholes
            .locations()
            .map(|location| Self::sample_temperature(backend, field, boreholes, location))
            .collect();

        let draws = temperatures
            .iter()
            .map(|temperature| match temperature {
                SampledTemperature::Available(temperature) => heat_pump_draw(
                    demand,
                    *temperature,
                    self.target_temperature,
                    self.time_step,
                    self.efficiency,
                ),
                SampledTemperature::Undefined => HeatPumpDraw::Idle,
            })
            .collect();

        BoreholeReadings {
            temperatures,
            draws,
        }
    }
}
