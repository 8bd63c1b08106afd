use crate::core::borehole_field::BoreholeField;
use crate::fem::FemBackend;
use nalgebra::{DVector, Point2};
use serde::Deserialize;
use std::f64::consts::PI;
use strum::Display;

/// How the borehole heat flow is placed on the right-hand side.
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SourceMode {
    /// One singular load per borehole.
    #[strum(serialize = "point source")]
    PointSource,
    /// A normalised Gaussian around every borehole, projected onto the basis.
    #[default]
    #[strum(serialize = "regularized")]
    Regularized,
}

/// The load a single time step adds to the right-hand side.
#[derive(Debug)]
pub enum RhsContribution<'a> {
    PointLoads {
        locations: &'a [Point2<f64>],
        magnitude: f64,
    },
    Density {
        shape: &'a DVector<f64>,
        scale: f64,
    },
}

impl RhsContribution<'_> {
    /// Add this contribution to an assembled load vector.
    pub fn accumulate_into<B: FemBackend>(&self, backend: &B, rhs: &mut DVector<f64>) {
        match self {
            RhsContribution::PointLoads {
                locations,
                magnitude,
            } => backend.add_point_loads(rhs, locations, *magnitude),
            RhsContribution::Density { shape, scale } => {
                *rhs += backend.assemble_mass_action(shape) * *scale;
            }
        }
    }
}

#[derive(Clone, Debug)]
enum SourceRepresentation {
    Points,
    Density(DVector<f64>),
}

/// The borehole field as a heat source. Any spatial shape is computed once, each step
/// only scales it.
#[derive(Clone, Debug)]
pub struct BoreholeSource {
    locations: Vec<Point2<f64>>,
    representation: SourceRepresentation,
}

impl BoreholeSource {
    /// Arguments:
    /// * `mode`    - point loads or regularised density
    /// * `field`   - the borehole field
    /// * `backend` - supplies the dof coordinates the density is evaluated at
    /// * `width`   - standard deviation of the Gaussian kernel in m (the fine mesh size)
    pub fn new<B: FemBackend>(
        mode: SourceMode,
        field: &BoreholeField,
        backend: &B,
        width: f64,
    ) -> Self {
        let locations = field.location_vec();
        let representation = match mode {
            SourceMode::PointSource => SourceRepresentation::Points,
            SourceMode::Regularized => SourceRepresentation::Density(gaussian_density(
                backend.dof_coordinates(),
                &locations,
                width,
            )),
        };

        Self {
            locations,
            representation,
        }
    }

    pub fn mode(&self) -> SourceMode {
        match self.representation {
            SourceRepresentation::Points => SourceMode::PointSource,
            SourceRepresentation::Density(_) => SourceMode::Regularized,
        }
    }

    pub fn locations(&self) -> &[Point2<f64>] {
        &self.locations
    }

    /// Describe the load of a step with normalised demand `q` at every borehole.
    pub fn inject(&self, q: f64) -> RhsContribution<'_> {
        match &self.representation {
            SourceRepresentation::Points => RhsContribution::PointLoads {
                locations: &self.locations,
                magnitude: q,
            },
            SourceRepresentation::Density(shape) => RhsContribution::Density { shape, scale: q },
        }
    }
}

/// Sum of unit-mass 2D Gaussians centred on each location, evaluated at each point.
pub fn gaussian_density(
    points: &[Point2<f64>],
    locations: &[Point2<f64>],
    sigma: f64,
) -> DVector<f64> {
    let norm = 1. / (2. * PI * sigma * sigma);

    DVector::from_iterator(
        points.len(),
        points.iter().map(|point| {
            locations
                .iter()
                .map(|location| {
                    let r2 = nalgebra::distance_squared(point, location);
                    norm * (-r2 / (2. * sigma * sigma)).exp()
                })
                .sum::<f64>()
        }),
    )
}
