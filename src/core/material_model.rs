use std::fmt::{Display, Formatter};
use thiserror::Error;
use tracing::info;

/// Thermal conductivity and volumetric heat capacity of a single material.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThermalProperties {
    pub thermal_conductivity: f64,  // W/(m.K)
    pub heat_capacity_density: f64, // J/(m3.K)
}

impl ThermalProperties {
    pub fn new(thermal_conductivity: f64, heat_capacity_density: f64) -> Self {
        Self {
            thermal_conductivity,
            heat_capacity_density,
        }
    }
}

/// Effective coefficients of the ground/groundwater mixture, fixed for the whole run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialCoefficients {
    thermal_conductivity: f64,
    heat_capacity_density: f64,
}

impl MaterialCoefficients {
    pub fn new(
        thermal_conductivity: f64,
        heat_capacity_density: f64,
    ) -> Result<Self, MaterialModelError> {
        if !(thermal_conductivity > 0. && heat_capacity_density > 0.) {
            return Err(MaterialModelError::NonPositiveCoefficients {
                thermal_conductivity,
                heat_capacity_density,
            });
        }

        Ok(Self {
            thermal_conductivity,
            heat_capacity_density,
        })
    }

    /// Effective thermal conductivity in W/(m.K)
    pub fn thermal_conductivity(&self) -> f64 {
        self.thermal_conductivity
    }

    /// Effective volumetric heat capacity in J/(m3.K)
    pub fn heat_capacity_density(&self) -> f64 {
        self.heat_capacity_density
    }

    /// Thermal diffusivity λ/ρc in m2/s
    pub fn diffusivity(&self) -> f64 {
        self.thermal_conductivity / self.heat_capacity_density
    }
}

/// The closed-form mixing laws available for the effective conductivity of a saturated porous ground.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConductivityModel {
    /// λ_eff = λ_g (1 - φ(1 + 2r)(1 - r) / (φ(1 - r) + 3r))
    Type1,
    /// λ_eff = λ_g (1 - 3φ(1 - r) / (2 + φ + r))
    Type2,
    /// λ_eff = φλ_f + (1 - φ)λ_g
    Type3,
}

impl ConductivityModel {
    fn id(&self) -> u8 {
        match self {
            ConductivityModel::Type1 => 1,
            ConductivityModel::Type2 => 2,
            ConductivityModel::Type3 => 3,
        }
    }

    fn effective_conductivity(
        &self,
        lambda_ground: f64,
        lambda_fluid: f64,
        porosity: f64,
    ) -> Result<f64, MaterialModelError> {
        match self {
            ConductivityModel::Type1 | ConductivityModel::Type2 if lambda_ground == 0. => {
                Err(MaterialModelError::ZeroGroundConductivity(self.id()))
            }
            ConductivityModel::Type1 => {
                let r = lambda_fluid / lambda_ground;
                let numerator = porosity * (1. + 2. * r) * (1. - r);
                let denominator = porosity * (1. - r) + 3. * r;
                Ok(lambda_ground * (1. - numerator / denominator))
            }
            ConductivityModel::Type2 => {
                let r = lambda_fluid / lambda_ground;
                Ok(lambda_ground * (1. - (3. * porosity * (1. - r)) / (2. + porosity + r)))
            }
            ConductivityModel::Type3 => {
                Ok(porosity * lambda_fluid + (1. - porosity) * lambda_ground)
            }
        }
    }
}

impl TryFrom<u8> for ConductivityModel {
    type Error = MaterialModelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ConductivityModel::Type1),
            2 => Ok(ConductivityModel::Type2),
            3 => Ok(ConductivityModel::Type3),
            other => Err(MaterialModelError::InvalidModel(other)),
        }
    }
}

impl Display for ConductivityModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "model {}", self.id())
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum MaterialModelError {
    #[error("Invalid model type {0}. Model parameter must be 1, 2, or 3.")]
    InvalidModel(u8),
    #[error("λ_g must be non-zero to compute conductivity model {0}.")]
    ZeroGroundConductivity(u8),
    #[error("Effective material coefficients must be strictly positive (λ = {thermal_conductivity}, ρc = {heat_capacity_density})")]
    NonPositiveCoefficients {
        thermal_conductivity: f64,
        heat_capacity_density: f64,
    },
}

/// Mix ground and fluid properties with the selected conductivity model.
///
/// Arguments:
/// * `model`    - conductivity model id (1, 2 or 3)
/// * `ground`   - properties of the dry ground matrix
/// * `fluid`    - properties of the groundwater
/// * `porosity` - volume fraction of groundwater, 0 to 1
pub fn weighted_parameter(
    model: u8,
    ground: ThermalProperties,
    fluid: ThermalProperties,
    porosity: f64,
) -> Result<MaterialCoefficients, MaterialModelError> {
    let model = ConductivityModel::try_from(model)?;

    let lambda_eff = model.effective_conductivity(
        ground.thermal_conductivity,
        fluid.thermal_conductivity,
        porosity,
    )?;
    let rho_c_eff =
        porosity * fluid.heat_capacity_density + (1. - porosity) * ground.heat_capacity_density;

    info!(
        "Effective thermal conductivity (λ_eff): {lambda_eff:.2} W/(m·K), effective volumetric heat capacity (ρc_eff): {rho_c_eff:.2} J/(m³·K)"
    );

    MaterialCoefficients::new(lambda_eff, rho_c_eff)
}

/// Effective coefficients for the run. A ground without groundwater (zero porosity)
/// keeps its own properties, whichever model is selected.
pub fn effective_coefficients(
    model: u8,
    ground: ThermalProperties,
    fluid: ThermalProperties,
    porosity: f64,
) -> Result<MaterialCoefficients, MaterialModelError> {
    if porosity == 0. {
        return MaterialCoefficients::new(
            ground.thermal_conductivity,
            ground.heat_capacity_density,
        );
    }

    weighted_parameter(model, ground, fluid, porosity)
}
