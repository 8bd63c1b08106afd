use crate::core::units::joules_to_kilowatt_hours;
use crate::fem::FemBackend;
use nalgebra::DVector;

/// Energy terms of a single step, per metre of borehole.
///
/// `residual` is always `ground + flux + probe`; a correctly assembled and solved
/// system drives it towards zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnergyBalance {
    /// Change in stored ground energy, positive when the ground cools
    pub ground: f64,
    /// Energy leaving through the outer boundary, sign reversed
    pub flux: f64,
    /// Energy injected by all boreholes
    pub probe: f64,
    pub residual: f64,
}

impl EnergyBalance {
    pub fn new(ground: f64, flux: f64, probe: f64) -> Self {
        Self {
            ground,
            flux,
            probe,
            residual: ground + flux + probe,
        }
    }

    /// Arguments:
    /// * `backend`               - integrates the fields
    /// * `heat_capacity_density` - effective ρc in J/(m3.K)
    /// * `previous`, `current`   - temperature fields before and after the step
    /// * `boundary_flux`         - outward boundary heat flux of `current` in W/m
    /// * `time_step`             - step length in seconds
    /// * `demand`                - demand per borehole in W/m before normalisation
    /// * `boreholes`             - number of boreholes
    pub fn compute<B: FemBackend>(
        backend: &B,
        heat_capacity_density: f64,
        previous: &DVector<f64>,
        current: &DVector<f64>,
        boundary_flux: f64,
        time_step: f64,
        demand: f64,
        boreholes: usize,
    ) -> Self {
        let ground = heat_capacity_density
            * (backend.domain_integral(1., previous) - backend.domain_integral(1., current));
        let flux = -time_step * boundary_flux;
        let probe = time_step * demand * boreholes as f64;

        Self::new(ground, flux, probe)
    }

    /// The balance rescaled from J to kWh, residual recomputed from the scaled terms.
    pub fn in_kilowatt_hours(&self) -> Self {
        Self::new(
            joules_to_kilowatt_hours(self.ground),
            joules_to_kilowatt_hours(self.flux),
            joules_to_kilowatt_hours(self.probe),
        )
    }

    /// Net exchange with the boreholes and the stored ground energy.
    pub fn in_out(&self) -> f64 {
        self.ground + self.probe
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fem::structured::{StructuredBackend, StructuredMesh};
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn backend() -> StructuredBackend {
        let axis: Vec<f64> = (0..=4).map(|k| k as f64).collect();
        StructuredBackend::new(StructuredMesh::new(axis.clone(), axis).unwrap(), 10.)
    }

    #[rstest]
    #[case(1.5, -2.25, 0.75)]
    #[case(1e9, 3.3e-3, -7.1e4)]
    #[case(-0.1, 0.2, 0.3)]
    fn should_define_residual_as_sum_of_terms(
        #[case] ground: f64,
        #[case] flux: f64,
        #[case] probe: f64,
    ) {
        let balance = EnergyBalance::new(ground, flux, probe);

        assert_eq!(balance.residual, ground + flux + probe);
        let scaled = balance.in_kilowatt_hours();
        assert_eq!(scaled.residual, scaled.ground + scaled.flux + scaled.probe);
    }

    #[rstest]
    fn should_compute_terms(backend: StructuredBackend) {
        let previous = DVector::from_element(backend.num_dofs(), 11.);
        let current = DVector::from_element(backend.num_dofs(), 10.);

        let balance = EnergyBalance::compute(&backend, 2.0e6, &previous, &current, 4., 3600., -30., 2);

        // 16 m2 cooled by 1 K
        assert_relative_eq!(balance.ground, 2.0e6 * 16., max_relative = 1e-12);
        assert_eq!(balance.flux, -4. * 3600.);
        assert_eq!(balance.probe, 3600. * -30. * 2.);
        assert_eq!(balance.residual, balance.ground + balance.flux + balance.probe);
        assert_eq!(balance.in_out(), balance.ground + balance.probe);
    }

    #[rstest]
    fn should_convert_to_kilowatt_hours() {
        let balance = EnergyBalance::new(7.2e6, -3.6e6, 0.).in_kilowatt_hours();

        assert_eq!(balance, EnergyBalance::new(2., -1., 0.));
    }
}
