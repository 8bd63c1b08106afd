//! The interface through which the engine drives a finite-element discretisation of
//! the ground domain. The engine only ever talks to the discretisation through
//! [`FemBackend`]; [`structured::StructuredBackend`] is the implementation shipped with
//! the crate.

mod banded;
pub mod structured;

use nalgebra::{DVector, Point2, Vector2};
use thiserror::Error;

/// The convective part of the system operator: `coefficient * (v . grad T)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvectionTerm {
    pub coefficient: f64,
    pub velocity: Vector2<f64>,
}

/// Coefficients of the constant bilinear form
/// `mass * (T, w) + diffusion * (grad T, grad w) + convection * (v . grad T, w)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OperatorCoefficients {
    pub mass: f64,
    pub diffusion: f64,
    pub convection: Option<ConvectionTerm>,
}

/// Mesh geometry handed to the output collaborator alongside a field snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotGeometry {
    pub coordinates: Vec<Point2<f64>>,
    pub cells: Vec<[usize; 3]>,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum FemError {
    #[error("Zero pivot encountered in row {row} while factorising the system operator")]
    ZeroPivot { row: usize },
    #[error("The system operator must be factorised before it can be solved")]
    NotFactorised,
    #[error("Vector of length {actual} does not match the {expected} degrees of freedom")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),
}

pub trait FemBackend {
    type Operator;

    /// Number of degrees of freedom of the scalar field.
    fn num_dofs(&self) -> usize;

    /// Coordinates of every degree of freedom, in dof order.
    fn dof_coordinates(&self) -> &[Point2<f64>];

    /// Largest cell diameter of the mesh.
    fn max_cell_size(&self) -> f64;

    fn assemble_operator(&self, coefficients: &OperatorCoefficients) -> Self::Operator;

    /// Impose the fixed boundary temperature on the operator's boundary rows.
    fn apply_boundary_to_operator(&self, operator: &mut Self::Operator);

    /// Prepare the operator for repeated solves (e.g. factorise it).
    fn factorise(&self, operator: &mut Self::Operator) -> Result<(), FemError>;

    /// The load vector `(field, w)` for every test function `w`.
    fn assemble_mass_action(&self, field: &DVector<f64>) -> DVector<f64>;

    /// Add singular loads of the given magnitude at each point to an assembled vector.
    fn add_point_loads(&self, rhs: &mut DVector<f64>, points: &[Point2<f64>], magnitude: f64);

    /// Impose the fixed boundary temperature on a load vector.
    fn apply_boundary_to_rhs(&self, rhs: &mut DVector<f64>);

    /// Solve `operator * solution = rhs`, writing into a caller-owned buffer.
    fn solve(
        &self,
        operator: &Self::Operator,
        rhs: &DVector<f64>,
        solution: &mut DVector<f64>,
    ) -> Result<(), FemError>;

    /// Value of the field at a point, or `None` when the point lies outside the domain.
    fn sample_at(&self, field: &DVector<f64>, point: &Point2<f64>) -> Option<f64>;

    /// Outward conductive heat flux `-λ grad T . n` integrated over the outer boundary.
    fn boundary_flux_integral(&self, field: &DVector<f64>, conductivity: f64) -> f64;

    /// `coefficient * integral of field` over the domain.
    fn domain_integral(&self, coefficient: f64, field: &DVector<f64>) -> f64;

    fn snapshot_geometry(&self) -> SnapshotGeometry;
}
