use crate::core::borehole_field::BoreholeFieldError;
use crate::core::material_model::MaterialModelError;
use crate::core::operator_builder::{OperatorBuildError, StabilityError};
use crate::core::power_profile::PowerProfileError;
use crate::fem::FemError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubterraError {
    #[error("Invalid configuration: {0}")]
    Configuration(anyhow::Error),
    #[error("Numerical instability: {0}")]
    NumericalInstability(#[from] StabilityError),
    #[error("Missing data: {0}")]
    MissingData(#[from] PowerProfileError),
    #[error("Solver failure: {0}")]
    SolverFailure(#[from] FemError),
    #[error("Could not write results: {0}")]
    Output(anyhow::Error),
}

impl SubterraError {
    pub fn configuration(error: impl Into<anyhow::Error>) -> Self {
        Self::Configuration(error.into())
    }

    /// Process exit status for this category of failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            SubterraError::Configuration(_) => 2,
            SubterraError::NumericalInstability(_) => 3,
            SubterraError::MissingData(_) => 4,
            SubterraError::SolverFailure(_) => 5,
            SubterraError::Output(_) => 6,
        }
    }
}

impl From<MaterialModelError> for SubterraError {
    fn from(error: MaterialModelError) -> Self {
        Self::configuration(error)
    }
}

impl From<BoreholeFieldError> for SubterraError {
    fn from(error: BoreholeFieldError) -> Self {
        Self::configuration(error)
    }
}

impl From<OperatorBuildError> for SubterraError {
    fn from(error: OperatorBuildError) -> Self {
        match error {
            OperatorBuildError::Unstable(error) => error.into(),
            OperatorBuildError::Backend(error) => error.into(),
        }
    }
}
