use crate::fem::banded::{BandLu, BandMatrix};
use crate::fem::{FemBackend, FemError, OperatorCoefficients, SnapshotGeometry};
use itertools::Itertools;
use nalgebra::{DVector, Point2, Vector2};
use tracing::{info, warn};

/// Distance from a borehole over which the mesh coarsens from the fine to the coarse size, in m.
pub const REFINEMENT_DISTANCE: f64 = 30.;

/// Target element sizes of the graded mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshSizing {
    /// Element size next to a borehole, in m
    pub fine: f64,
    /// Element size far from the borehole field, in m
    pub coarse: f64,
    /// Distance over which the size grows from `fine` to `coarse`, in m
    pub transition_distance: f64,
}

impl MeshSizing {
    pub fn new(fine: f64, coarse: f64) -> Self {
        Self {
            fine,
            coarse,
            transition_distance: REFINEMENT_DISTANCE,
        }
    }

    fn size_at(&self, position: f64, anchors: &[f64]) -> f64 {
        let distance = anchors
            .iter()
            .map(|anchor| (position - anchor).abs())
            .fold(f64::INFINITY, f64::min);
        if distance.is_infinite() {
            return self.coarse;
        }

        (self.fine + (self.coarse - self.fine) * distance / self.transition_distance)
            .min(self.coarse)
    }
}

/// Node positions along one axis of the domain, refined around the anchor positions
/// (the projections of the boreholes onto that axis). Anchors inside the interval
/// become nodes themselves.
pub fn graded_axis(lower: f64, upper: f64, anchors: &[f64], sizing: &MeshSizing) -> Vec<f64> {
    let margin = 0.5 * sizing.fine;
    let mut breakpoints: Vec<f64> = anchors
        .iter()
        .copied()
        .filter(|anchor| *anchor > lower + margin && *anchor < upper - margin)
        .sorted_by(f64::total_cmp)
        .collect();
    breakpoints.dedup_by(|later, earlier| *later - *earlier < margin);
    breakpoints.insert(0, lower);
    breakpoints.push(upper);

    let mut axis = vec![lower];
    for (&start, &end) in breakpoints.iter().tuple_windows() {
        let mut interior = vec![];
        let mut position = start;
        loop {
            let next = position + sizing.size_at(position, anchors);
            if next >= end {
                break;
            }
            interior.push(next);
            position = next;
        }
        if let Some(&last) = interior.last() {
            if end - last < 0.5 * sizing.size_at(last, anchors) {
                interior.pop();
            }
        }
        axis.extend(interior);
        axis.push(end);
    }

    axis
}

/// Gradients of the three linear basis functions of a triangle, and its area.
struct TriangleGeometry {
    area: f64,
    gradients: [Vector2<f64>; 3],
}

impl TriangleGeometry {
    fn new(vertices: [Point2<f64>; 3]) -> Self {
        let [p0, p1, p2] = vertices;
        let det = (p1.x - p0.x) * (p2.y - p0.y) - (p2.x - p0.x) * (p1.y - p0.y);
        let gradient = |pj: Point2<f64>, pk: Point2<f64>| {
            Vector2::new((pj.y - pk.y) / det, (pk.x - pj.x) / det)
        };

        Self {
            area: 0.5 * det.abs(),
            gradients: [gradient(p1, p2), gradient(p2, p0), gradient(p0, p1)],
        }
    }

    fn mass(&self, a: usize, b: usize) -> f64 {
        if a == b {
            self.area / 6.
        } else {
            self.area / 12.
        }
    }

    fn stiffness(&self, a: usize, b: usize) -> f64 {
        self.area * self.gradients[a].dot(&self.gradients[b])
    }
}

/// A rectangle covered by a tensor-product grid, each grid cell split along its
/// rising diagonal into two linear triangles. Nodes are numbered row by row.
#[derive(Clone, Debug)]
pub struct StructuredMesh {
    xs: Vec<f64>,
    ys: Vec<f64>,
    coordinates: Vec<Point2<f64>>,
}

impl StructuredMesh {
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, FemError> {
        for (name, axis) in [("x", &xs), ("y", &ys)] {
            if axis.len() < 2 {
                return Err(FemError::InvalidMesh(format!(
                    "{name} axis needs at least two nodes"
                )));
            }
            if !axis.iter().tuple_windows().all(|(a, b)| a < b) {
                return Err(FemError::InvalidMesh(format!(
                    "{name} axis must be strictly increasing"
                )));
            }
        }

        let coordinates = ys
            .iter()
            .flat_map(|y| xs.iter().map(move |x| Point2::new(*x, *y)))
            .collect();

        Ok(Self {
            xs,
            ys,
            coordinates,
        })
    }

    /// Mesh of the rectangle centred on `centre`, refined around the boreholes.
    pub fn graded(
        centre: Point2<f64>,
        x_length: f64,
        y_length: f64,
        boreholes: &[Point2<f64>],
        sizing: &MeshSizing,
    ) -> Result<Self, FemError> {
        let x_anchors: Vec<f64> = boreholes.iter().map(|p| p.x).collect();
        let y_anchors: Vec<f64> = boreholes.iter().map(|p| p.y).collect();

        let xs = graded_axis(
            centre.x - x_length / 2.,
            centre.x + x_length / 2.,
            &x_anchors,
            sizing,
        );
        let ys = graded_axis(
            centre.y - y_length / 2.,
            centre.y + y_length / 2.,
            &y_anchors,
            sizing,
        );

        let mesh = Self::new(xs, ys)?;
        info!(
            "Mesh successfully created: {} x {} nodes, {} triangles",
            mesh.xs.len(),
            mesh.ys.len(),
            mesh.num_triangles()
        );

        Ok(mesh)
    }

    pub fn num_nodes(&self) -> usize {
        self.coordinates.len()
    }

    pub fn num_triangles(&self) -> usize {
        2 * (self.xs.len() - 1) * (self.ys.len() - 1)
    }

    fn node(&self, i: usize, j: usize) -> usize {
        j * self.xs.len() + i
    }

    fn half_bandwidth(&self) -> usize {
        self.xs.len() + 1
    }

    fn lower_triangle(&self, i: usize, j: usize) -> [usize; 3] {
        [
            self.node(i, j),
            self.node(i + 1, j),
            self.node(i + 1, j + 1),
        ]
    }

    fn upper_triangle(&self, i: usize, j: usize) -> [usize; 3] {
        [
            self.node(i, j),
            self.node(i + 1, j + 1),
            self.node(i, j + 1),
        ]
    }

    fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        (0..self.ys.len() - 1)
            .cartesian_product(0..self.xs.len() - 1)
            .flat_map(|(j, i)| [self.lower_triangle(i, j), self.upper_triangle(i, j)])
    }

    fn geometry(&self, triangle: &[usize; 3]) -> TriangleGeometry {
        TriangleGeometry::new(triangle.map(|node| self.coordinates[node]))
    }

    fn boundary_nodes(&self) -> Vec<usize> {
        let last_i = self.xs.len() - 1;
        let last_j = self.ys.len() - 1;
        (0..self.num_nodes())
            .filter(|node| {
                let (i, j) = (node % self.xs.len(), node / self.xs.len());
                i == 0 || j == 0 || i == last_i || j == last_j
            })
            .collect()
    }

    /// Index of the grid interval containing `value`, or `None` outside the axis.
    fn interval(axis: &[f64], value: f64) -> Option<usize> {
        let (first, last) = (axis[0], axis[axis.len() - 1]);
        if !(value >= first && value <= last) {
            return None;
        }
        Some((axis.partition_point(|node| *node <= value) - 1).min(axis.len() - 2))
    }

    /// The triangle containing a point, with the point's barycentric weights.
    fn locate(&self, point: &Point2<f64>) -> Option<([usize; 3], [f64; 3])> {
        let i = Self::interval(&self.xs, point.x)?;
        let j = Self::interval(&self.ys, point.y)?;
        let s = (point.x - self.xs[i]) / (self.xs[i + 1] - self.xs[i]);
        let t = (point.y - self.ys[j]) / (self.ys[j + 1] - self.ys[j]);

        if t <= s {
            Some((self.lower_triangle(i, j), [1. - s, s - t, t]))
        } else {
            Some((self.upper_triangle(i, j), [1. - t, s, t - s]))
        }
    }

    fn max_cell_size(&self) -> f64 {
        let widest = |axis: &[f64]| {
            axis.iter()
                .tuple_windows()
                .map(|(a, b)| b - a)
                .fold(0., f64::max)
        };
        widest(&self.xs).hypot(widest(&self.ys))
    }

    /// Boundary edges as (adjacent triangle, outward normal, edge length).
    fn boundary_edges(&self) -> Vec<([usize; 3], Vector2<f64>, f64)> {
        let cells_x = self.xs.len() - 1;
        let cells_y = self.ys.len() - 1;
        let dx = |i: usize| self.xs[i + 1] - self.xs[i];
        let dy = |j: usize| self.ys[j + 1] - self.ys[j];

        let bottom = (0..cells_x).map(|i| (self.lower_triangle(i, 0), -Vector2::y(), dx(i)));
        let top = (0..cells_x).map(|i| (self.upper_triangle(i, cells_y - 1), Vector2::y(), dx(i)));
        let left = (0..cells_y).map(|j| (self.upper_triangle(0, j), -Vector2::x(), dy(j)));
        let right =
            (0..cells_y).map(|j| (self.lower_triangle(cells_x - 1, j), Vector2::x(), dy(j)));

        bottom.chain(top).chain(left).chain(right).collect()
    }
}

/// The constant system operator of the structured backend, factorised once before stepping.
#[derive(Clone, Debug)]
pub struct BandedOperator {
    matrix: BandMatrix,
    factors: Option<BandLu>,
}

/// Linear finite elements on a [`StructuredMesh`] with a fixed temperature on the
/// whole outer boundary.
#[derive(Clone, Debug)]
pub struct StructuredBackend {
    mesh: StructuredMesh,
    boundary_temperature: f64,
    boundary_nodes: Vec<usize>,
    boundary_edges: Vec<([usize; 3], Vector2<f64>, f64)>,
}

impl StructuredBackend {
    pub fn new(mesh: StructuredMesh, boundary_temperature: f64) -> Self {
        let boundary_nodes = mesh.boundary_nodes();
        let boundary_edges = mesh.boundary_edges();

        Self {
            mesh,
            boundary_temperature,
            boundary_nodes,
            boundary_edges,
        }
    }

    pub fn mesh(&self) -> &StructuredMesh {
        &self.mesh
    }

    pub fn boundary_temperature(&self) -> f64 {
        self.boundary_temperature
    }

    fn check_dim(&self, vector: &DVector<f64>) -> Result<(), FemError> {
        if vector.len() != self.num_dofs() {
            return Err(FemError::DimensionMismatch {
                expected: self.num_dofs(),
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl FemBackend for StructuredBackend {
    type Operator = BandedOperator;

    fn num_dofs(&self) -> usize {
        self.mesh.num_nodes()
    }

    fn dof_coordinates(&self) -> &[Point2<f64>] {
        &self.mesh.coordinates
    }

    fn max_cell_size(&self) -> f64 {
        self.mesh.max_cell_size()
    }

    fn assemble_operator(&self, coefficients: &OperatorCoefficients) -> BandedOperator {
        let mut matrix = BandMatrix::zeros(self.num_dofs(), self.mesh.half_bandwidth());

        for triangle in self.mesh.triangles() {
            let geometry = self.mesh.geometry(&triangle);
            for a in 0..3 {
                for b in 0..3 {
                    let mut value = coefficients.mass * geometry.mass(a, b)
                        + coefficients.diffusion * geometry.stiffness(a, b);
                    if let Some(convection) = coefficients.convection {
                        value += convection.coefficient
                            * convection.velocity.dot(&geometry.gradients[b])
                            * geometry.area
                            / 3.;
                    }
                    matrix.add(triangle[a], triangle[b], value);
                }
            }
        }

        BandedOperator {
            matrix,
            factors: None,
        }
    }

    fn apply_boundary_to_operator(&self, operator: &mut BandedOperator) {
        for node in &self.boundary_nodes {
            operator.matrix.set_identity_row(*node);
        }
        operator.factors = None;
    }

    fn factorise(&self, operator: &mut BandedOperator) -> Result<(), FemError> {
        if operator.matrix.dim() != self.num_dofs() {
            return Err(FemError::DimensionMismatch {
                expected: self.num_dofs(),
                actual: operator.matrix.dim(),
            });
        }
        operator.factors = Some(operator.matrix.clone().factorise()?);
        Ok(())
    }

    fn assemble_mass_action(&self, field: &DVector<f64>) -> DVector<f64> {
        let mut load = DVector::zeros(self.num_dofs());
        for triangle in self.mesh.triangles() {
            let geometry = self.mesh.geometry(&triangle);
            for a in 0..3 {
                load[triangle[a]] += (0..3)
                    .map(|b| geometry.mass(a, b) * field[triangle[b]])
                    .sum::<f64>();
            }
        }
        load
    }

    fn add_point_loads(&self, rhs: &mut DVector<f64>, points: &[Point2<f64>], magnitude: f64) {
        for point in points {
            match self.mesh.locate(point) {
                Some((triangle, weights)) => {
                    for (node, weight) in triangle.iter().zip(weights) {
                        rhs[*node] += magnitude * weight;
                    }
                }
                None => warn!(
                    "Point load at ({}, {}) lies outside the domain and is ignored",
                    point.x, point.y
                ),
            }
        }
    }

    fn apply_boundary_to_rhs(&self, rhs: &mut DVector<f64>) {
        for node in &self.boundary_nodes {
            rhs[*node] = self.boundary_temperature;
        }
    }

    fn solve(
        &self,
        operator: &BandedOperator,
        rhs: &DVector<f64>,
        solution: &mut DVector<f64>,
    ) -> Result<(), FemError> {
        self.check_dim(rhs)?;
        self.check_dim(solution)?;
        let factors = operator.factors.as_ref().ok_or(FemError::NotFactorised)?;
        factors.solve_into(rhs, solution);
        Ok(())
    }

    fn sample_at(&self, field: &DVector<f64>, point: &Point2<f64>) -> Option<f64> {
        let (triangle, weights) = self.mesh.locate(point)?;
        Some(
            triangle
                .iter()
                .zip(weights)
                .map(|(node, weight)| weight * field[*node])
                .sum(),
        )
    }

    fn boundary_flux_integral(&self, field: &DVector<f64>, conductivity: f64) -> f64 {
        self.boundary_edges
            .iter()
            .map(|(triangle, normal, length)| {
                let geometry = self.mesh.geometry(triangle);
                let gradient: Vector2<f64> = (0..3)
                    .map(|a| geometry.gradients[a] * field[triangle[a]])
                    .sum();
                -conductivity * gradient.dot(normal) * length
            })
            .sum()
    }

    fn domain_integral(&self, coefficient: f64, field: &DVector<f64>) -> f64 {
        coefficient
            * self
                .mesh
                .triangles()
                .map(|triangle| {
                    let geometry = self.mesh.geometry(&triangle);
                    geometry.area / 3. * triangle.iter().map(|node| field[*node]).sum::<f64>()
                })
                .sum::<f64>()
    }

    fn snapshot_geometry(&self) -> SnapshotGeometry {
        SnapshotGeometry {
            coordinates: self.mesh.coordinates.clone(),
            cells: self.mesh.triangles().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fem::ConvectionTerm;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn unit_square() -> StructuredMesh {
        let axis: Vec<f64> = (0..=4).map(|k| k as f64 * 0.25).collect();
        StructuredMesh::new(axis.clone(), axis).unwrap()
    }

    #[fixture]
    fn backend(unit_square: StructuredMesh) -> StructuredBackend {
        StructuredBackend::new(unit_square, 10.)
    }

    fn linear_field(backend: &StructuredBackend, f: impl Fn(&Point2<f64>) -> f64) -> DVector<f64> {
        DVector::from_iterator(
            backend.num_dofs(),
            backend.dof_coordinates().iter().map(f),
        )
    }

    #[rstest]
    fn should_reject_degenerate_axes() {
        assert!(StructuredMesh::new(vec![0.], vec![0., 1.]).is_err());
        assert!(StructuredMesh::new(vec![0., 1., 1.], vec![0., 1.]).is_err());
    }

    #[rstest]
    fn should_count_nodes_and_triangles(unit_square: StructuredMesh) {
        assert_eq!(unit_square.num_nodes(), 25);
        assert_eq!(unit_square.num_triangles(), 32);
        assert_eq!(unit_square.boundary_nodes().len(), 16);
    }

    #[rstest]
    fn should_report_max_cell_diameter(backend: StructuredBackend) {
        assert_relative_eq!(backend.max_cell_size(), 0.25 * 2f64.sqrt(), max_relative = 1e-12);
    }

    #[rstest]
    fn should_grade_axis_towards_anchors() {
        let sizing = MeshSizing::new(0.5, 5.);
        let axis = graded_axis(-50., 50., &[0.], &sizing);

        assert_eq!(axis.first(), Some(&-50.));
        assert_eq!(axis.last(), Some(&50.));
        assert!(axis.contains(&0.));
        assert!(axis.iter().tuple_windows().all(|(a, b)| a < b));

        let spacing_near = axis
            .iter()
            .tuple_windows()
            .find(|(a, _)| **a >= 0.)
            .map(|(a, b)| b - a)
            .unwrap();
        let spacing_far = axis[axis.len() - 1] - axis[axis.len() - 2];
        assert!(spacing_near < 1.);
        assert!(spacing_far > 3.);
        assert!(axis
            .iter()
            .tuple_windows()
            .all(|(a, b)| b - a <= 1.5 * sizing.coarse));
    }

    #[rstest]
    fn should_use_coarse_spacing_without_anchors() {
        let axis = graded_axis(0., 10., &[], &MeshSizing::new(0.1, 2.));

        assert_eq!(axis, vec![0., 2., 4., 6., 8., 10.]);
    }

    #[rstest]
    fn should_integrate_linear_field_exactly(backend: StructuredBackend) {
        let field = linear_field(&backend, |p| 1. + 2. * p.x + 3. * p.y);

        // 1 + 2 * 0.5 + 3 * 0.5 over the unit square
        assert_relative_eq!(backend.domain_integral(2., &field), 7., max_relative = 1e-12);
    }

    #[rstest]
    fn should_interpolate_linear_field(backend: StructuredBackend) {
        let field = linear_field(&backend, |p| 4. * p.x - p.y);

        for point in [
            Point2::new(0.1, 0.7),
            Point2::new(0.33, 0.12),
            Point2::new(1., 1.),
        ] {
            assert_relative_eq!(
                backend.sample_at(&field, &point).unwrap(),
                4. * point.x - point.y,
                epsilon = 1e-12
            );
        }
    }

    #[rstest]
    fn should_miss_samples_outside_domain(backend: StructuredBackend) {
        let field = DVector::from_element(backend.num_dofs(), 1.);

        assert_eq!(backend.sample_at(&field, &Point2::new(-0.01, 0.5)), None);
        assert_eq!(backend.sample_at(&field, &Point2::new(0.5, 1.01)), None);
        assert_eq!(backend.sample_at(&field, &Point2::new(f64::NAN, 0.5)), None);
    }

    #[rstest]
    fn should_conserve_mass_action_total(backend: StructuredBackend) {
        let field = linear_field(&backend, |p| p.x * p.x + 1.);

        let load = backend.assemble_mass_action(&field);
        assert_relative_eq!(
            load.sum(),
            backend.domain_integral(1., &field),
            max_relative = 1e-12
        );
    }

    #[rstest]
    fn should_distribute_point_loads_by_barycentric_weight(backend: StructuredBackend) {
        let mut rhs = DVector::zeros(backend.num_dofs());
        backend.add_point_loads(
            &mut rhs,
            &[Point2::new(0.3, 0.6), Point2::new(2., 2.)],
            5.,
        );

        assert_relative_eq!(rhs.sum(), 5., max_relative = 1e-12);
    }

    #[rstest]
    fn should_compute_outward_flux_of_linear_field(backend: StructuredBackend) {
        // T = x gives -λ dT/dx = -λ out of the right edge and +λ out of the left edge
        let field = linear_field(&backend, |p| p.x);
        assert_relative_eq!(
            backend.boundary_flux_integral(&field, 2.),
            0.,
            epsilon = 1e-12
        );

        // a dome peaking at the centre loses heat through every edge
        let field = linear_field(&backend, |p| -(p.x - 0.5).powi(2) - (p.y - 0.5).powi(2));
        assert!(backend.boundary_flux_integral(&field, 1.) > 0.);
    }

    #[rstest]
    fn should_reproduce_steady_state(backend: StructuredBackend) {
        let mut operator = backend.assemble_operator(&OperatorCoefficients {
            mass: 1.,
            diffusion: 0.5,
            convection: None,
        });
        backend.apply_boundary_to_operator(&mut operator);
        backend.factorise(&mut operator).unwrap();

        let previous = DVector::from_element(backend.num_dofs(), 10.);
        let mut rhs = backend.assemble_mass_action(&previous);
        backend.apply_boundary_to_rhs(&mut rhs);

        let mut current = DVector::zeros(backend.num_dofs());
        backend.solve(&operator, &rhs, &mut current).unwrap();

        for value in current.iter() {
            assert_relative_eq!(*value, 10., max_relative = 1e-12);
        }
    }

    #[rstest]
    fn should_keep_constant_field_under_convection(backend: StructuredBackend) {
        let mut operator = backend.assemble_operator(&OperatorCoefficients {
            mass: 1.,
            diffusion: 0.1,
            convection: Some(ConvectionTerm {
                coefficient: 0.5,
                velocity: Vector2::new(0.2, -0.1),
            }),
        });
        backend.apply_boundary_to_operator(&mut operator);
        backend.factorise(&mut operator).unwrap();

        let previous = DVector::from_element(backend.num_dofs(), 10.);
        let mut rhs = backend.assemble_mass_action(&previous);
        backend.apply_boundary_to_rhs(&mut rhs);
        let mut current = DVector::zeros(backend.num_dofs());
        backend.solve(&operator, &rhs, &mut current).unwrap();

        for value in current.iter() {
            assert_relative_eq!(*value, 10., max_relative = 1e-12);
        }
    }

    #[rstest]
    fn should_refuse_to_solve_unfactorised_operator(backend: StructuredBackend) {
        let operator = backend.assemble_operator(&OperatorCoefficients {
            mass: 1.,
            diffusion: 1.,
            convection: None,
        });
        let rhs = DVector::zeros(backend.num_dofs());
        let mut solution = DVector::zeros(backend.num_dofs());

        assert_eq!(
            backend.solve(&operator, &rhs, &mut solution),
            Err(FemError::NotFactorised)
        );
    }

    #[rstest]
    fn should_reject_mismatched_buffers(backend: StructuredBackend) {
        let mut operator = backend.assemble_operator(&OperatorCoefficients {
            mass: 1.,
            diffusion: 1.,
            convection: None,
        });
        backend.factorise(&mut operator).unwrap();
        let rhs = DVector::zeros(3);
        let mut solution = DVector::zeros(backend.num_dofs());

        assert_eq!(
            backend.solve(&operator, &rhs, &mut solution),
            Err(FemError::DimensionMismatch {
                expected: 25,
                actual: 3
            })
        );
    }

    #[rstest]
    fn should_describe_snapshot_geometry(backend: StructuredBackend) {
        let geometry = backend.snapshot_geometry();

        assert_eq!(geometry.coordinates.len(), 25);
        assert_eq!(geometry.cells.len(), 32);
        assert_eq!(geometry.cells[0], [0, 1, 6]);
        assert_eq!(geometry.cells[1], [0, 6, 5]);
    }
}
