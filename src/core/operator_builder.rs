use crate::core::material_model::MaterialCoefficients;
use crate::fem::{ConvectionTerm, FemBackend, FemError, OperatorCoefficients};
use nalgebra::Vector2;
use thiserror::Error;
use tracing::info;

/// Largest admissible cell Péclet number.
pub const PECLET_LIMIT: f64 = 2.0;

/// The dimensionless number that governs the stability of the chosen discretisation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StabilityMetrics {
    /// Convection enabled
    Peclet(f64),
    /// Pure conduction
    Neumann(f64),
}

#[derive(Clone, Copy, Debug, Error, PartialEq)]
#[error("Péclet number {peclet:.3} exceeds the stability limit of {limit}")]
pub struct StabilityError {
    pub peclet: f64,
    pub limit: f64,
}

#[derive(Debug, Error)]
pub enum OperatorBuildError {
    #[error(transparent)]
    Unstable(#[from] StabilityError),
    #[error(transparent)]
    Backend(#[from] FemError),
}

/// Pe = v L / D
pub fn peclet_number(max_velocity: f64, max_distance: f64, diffusion_coefficient: f64) -> f64 {
    max_velocity * max_distance / diffusion_coefficient
}

/// Ne = D Δt / L²
pub fn neumann_number(diffusion_coefficient: f64, time_step: f64, max_distance: f64) -> f64 {
    diffusion_coefficient * time_step / max_distance.powi(2)
}

/// Fails when the Péclet number exceeds [`PECLET_LIMIT`].
pub fn check_peclet(
    max_velocity: f64,
    max_distance: f64,
    diffusion_coefficient: f64,
) -> Result<f64, StabilityError> {
    let peclet = peclet_number(max_velocity, max_distance, diffusion_coefficient);
    if peclet > PECLET_LIMIT {
        return Err(StabilityError {
            peclet,
            limit: PECLET_LIMIT,
        });
    }
    Ok(peclet)
}

/// Groundwater advection carried into the operator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Convection {
    pub porosity: f64,
    /// ρ_f c_f of the groundwater in J/(m3.K)
    pub fluid_heat_capacity_density: f64,
    /// ρc of the dry ground in J/(m3.K)
    pub ground_heat_capacity_density: f64,
    /// Darcy velocity in m/s
    pub velocity: Vector2<f64>,
}

impl Convection {
    fn coefficient(&self, time_step: f64) -> f64 {
        time_step * self.porosity * self.fluid_heat_capacity_density
            / self.ground_heat_capacity_density
    }

    fn max_velocity(&self) -> f64 {
        self.velocity.x.abs().max(self.velocity.y.abs())
    }
}

/// Composes the time-invariant system operator
/// `T + Δt D ∇²T (+ Δt c v.∇T)` from the material coefficients.
#[derive(Clone, Copy, Debug)]
pub struct OperatorBuilder {
    coefficients: MaterialCoefficients,
    time_step: f64,
    convection: Option<Convection>,
}

impl OperatorBuilder {
    /// Arguments:
    /// * `coefficients` - effective material coefficients
    /// * `time_step`    - step length in seconds
    /// * `convection`   - groundwater flow, `None` for pure conduction
    pub fn new(
        coefficients: MaterialCoefficients,
        time_step: f64,
        convection: Option<Convection>,
    ) -> Self {
        Self {
            coefficients,
            time_step,
            convection,
        }
    }

    pub fn operator_coefficients(&self) -> OperatorCoefficients {
        OperatorCoefficients {
            mass: 1.,
            diffusion: self.time_step * self.coefficients.diffusivity(),
            convection: self.convection.map(|convection| ConvectionTerm {
                coefficient: convection.coefficient(self.time_step),
                velocity: convection.velocity,
            }),
        }
    }

    /// Stability number for a mesh whose largest cell measures `max_distance`.
    pub fn stability(&self, max_distance: f64) -> Result<StabilityMetrics, StabilityError> {
        let diffusivity = self.coefficients.diffusivity();
        match self.convection {
            Some(convection) => {
                check_peclet(convection.max_velocity(), max_distance, diffusivity)
                    .map(StabilityMetrics::Peclet)
            }
            None => Ok(StabilityMetrics::Neumann(neumann_number(
                diffusivity,
                self.time_step,
                max_distance,
            ))),
        }
    }

    /// Check stability, then assemble, constrain and factorise the operator. Nothing is
    /// assembled when the discretisation is unstable.
    pub fn build<B: FemBackend>(
        &self,
        backend: &B,
    ) -> Result<(B::Operator, StabilityMetrics), OperatorBuildError> {
        let metrics = self.stability(backend.max_cell_size())?;
        match metrics {
            StabilityMetrics::Peclet(peclet) => info!("Péclet number: {peclet:.4}"),
            StabilityMetrics::Neumann(neumann) => info!("Neumann number: {neumann:.4}"),
        }

        let mut operator = backend.assemble_operator(&self.operator_coefficients());
        backend.apply_boundary_to_operator(&mut operator);
        backend.factorise(&mut operator)?;

        Ok((operator, metrics))
    }
}
