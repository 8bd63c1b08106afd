use crate::core::borehole_field::{BoreholeField, BoreholeFieldError, BoreholeLayout};
use crate::core::borehole_source::SourceMode;
use crate::core::material_model::ThermalProperties;
use crate::core::operator_builder::Convection;
use crate::errors::SubterraError;
use crate::fem::structured::MeshSizing;
use crate::simulation_time::SimulationTime;
use anyhow::anyhow;
use nalgebra::{Point2, Vector2};
use serde::Deserialize;
use serde_valid::Validate;
use std::io::Read;

/// Read and validate a parameter file. Values are expected in SI units.
pub fn ingest(json: impl Read) -> Result<SimulationParameters, SubterraError> {
    let parameters: SimulationParameters =
        serde_json::from_reader(json).map_err(SubterraError::configuration)?;
    parameters
        .validate()
        .map_err(|errors| SubterraError::Configuration(anyhow!("{errors}")))?;

    Ok(parameters)
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SimulationParameters {
    #[validate]
    pub ground: GroundInput,
    #[validate]
    pub groundwater: GroundwaterInput,
    #[validate]
    pub mesh: MeshInput,
    pub mesh_mode: BoreholeLayout,
    #[validate]
    pub time: SimulationTime,
    #[validate]
    pub power: PowerInput,
    /// Hot-side temperature the heat pumps deliver, in K
    #[validate(exclusive_minimum = 0.)]
    pub temperature_hot: f64,
    #[serde(default)]
    pub enable_convection: bool,
    #[serde(default)]
    pub source_mode: SourceMode,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GroundInput {
    #[validate(minimum = 0.)]
    pub thermal_conductivity: f64,
    #[validate(exclusive_minimum = 0.)]
    pub heat_capacity_density: f64,
    #[validate(minimum = 0.)]
    #[validate(maximum = 1.)]
    pub porosity: f64,
    /// Conductivity mixing law, 1 to 3
    pub model_type: u8,
    /// Initial and boundary temperature, in K
    #[validate(exclusive_minimum = 0.)]
    pub temperature: f64,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GroundwaterInput {
    #[validate(exclusive_minimum = 0.)]
    pub thermal_conductivity: f64,
    #[validate(exclusive_minimum = 0.)]
    pub density: f64,
    #[validate(exclusive_minimum = 0.)]
    pub specific_heat: f64,
    #[serde(default)]
    pub velocity_x: f64,
    #[serde(default)]
    pub velocity_y: f64,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MeshInput {
    #[validate(exclusive_minimum = 0.)]
    pub x_length: f64,
    #[validate(exclusive_minimum = 0.)]
    pub y_length: f64,
    pub x_center: f64,
    pub y_center: f64,
    #[validate(exclusive_minimum = 0.)]
    pub borehole_distance: f64,
    /// Coarse element size away from the boreholes, in m
    #[validate(exclusive_minimum = 0.)]
    pub mesh_factor: f64,
    /// Element size at the boreholes, in m
    #[validate(exclusive_minimum = 0.)]
    pub mesh_fine: f64,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PowerInput {
    pub coefficient_a: f64,
    pub coefficient_b: f64,
    #[validate(exclusive_minimum = 0.)]
    pub pipe_radius: f64,
    #[validate(exclusive_minimum = 0.)]
    pub efficiency: f64,
}

impl SimulationParameters {
    pub fn ground_properties(&self) -> ThermalProperties {
        ThermalProperties::new(
            self.ground.thermal_conductivity,
            self.ground.heat_capacity_density,
        )
    }

    pub fn fluid_properties(&self) -> ThermalProperties {
        ThermalProperties::new(
            self.groundwater.thermal_conductivity,
            self.groundwater.density * self.groundwater.specific_heat,
        )
    }

    pub fn velocity(&self) -> Vector2<f64> {
        Vector2::new(self.groundwater.velocity_x, self.groundwater.velocity_y)
    }

    /// The groundwater advection term, when enabled.
    pub fn convection(&self) -> Option<Convection> {
        self.enable_convection.then(|| Convection {
            porosity: self.ground.porosity,
            fluid_heat_capacity_density: self.fluid_properties().heat_capacity_density,
            ground_heat_capacity_density: self.ground.heat_capacity_density,
            velocity: self.velocity(),
        })
    }

    pub fn field_centre(&self) -> Point2<f64> {
        Point2::new(self.mesh.x_center, self.mesh.y_center)
    }

    pub fn mesh_sizing(&self) -> MeshSizing {
        MeshSizing::new(self.mesh.mesh_fine, self.mesh.mesh_factor)
    }

    /// The borehole field generated from the configured layout.
    pub fn borehole_field(&self) -> Result<BoreholeField, BoreholeFieldError> {
        BoreholeField::from_layout(
            self.mesh_mode,
            self.field_centre(),
            self.mesh.borehole_distance,
            self.power.pipe_radius,
        )
    }

    /// Name of the directory the results of this run are written to.
    pub fn results_folder_name(&self) -> String {
        format!(
            "{}_k={}_{}years",
            self.mesh_mode,
            self.ground.thermal_conductivity,
            self.time.simulation_years()
        )
    }
}
