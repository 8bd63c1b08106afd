use indexmap::IndexMap;
use itertools::iproduct;
use nalgebra::Point2;
use serde::Deserialize;
use std::fmt::{Display, Formatter};
use std::io::Read;
use thiserror::Error;

/// Arrangement of the borehole heat exchangers around the field centre.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase", deny_unknown_fields)]
pub enum BoreholeLayout {
    Hexagonal { rings: u32 },
    Square { rings: u32 },
}

impl BoreholeLayout {
    /// Enumerate borehole positions for this layout.
    ///
    /// Arguments:
    /// * `centre`   - centre of the borehole field
    /// * `distance` - spacing between neighbouring boreholes, in m
    pub fn locations(&self, centre: Point2<f64>, distance: f64) -> Vec<Point2<f64>> {
        match *self {
            BoreholeLayout::Hexagonal { rings } => hexagonal_locations(centre, distance, rings),
            BoreholeLayout::Square { rings } => square_locations(centre, distance, rings),
        }
    }
}

impl Display for BoreholeLayout {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BoreholeLayout::Hexagonal { rings } => write!(f, "hexa_{rings}"),
            BoreholeLayout::Square { rings } => write!(f, "square_{rings}"),
        }
    }
}

fn hexagonal_locations(centre: Point2<f64>, distance: f64, rings: u32) -> Vec<Point2<f64>> {
    let rings = rings as i64;
    // corner cells sit exactly on the limiting circle
    let max_distance = rings as f64 * distance * (1. + 1e-9);

    iproduct!(-rings..=rings, -rings..=rings)
        .filter(|(q, r)| (-q - r).abs() <= rings)
        .map(|(q, r)| {
            Point2::new(
                centre.x + distance * (q as f64 + r as f64 / 2.),
                centre.y + distance * 3f64.sqrt() / 2. * r as f64,
            )
        })
        .filter(|location| nalgebra::distance(location, &centre) <= max_distance)
        .collect()
}

fn square_locations(centre: Point2<f64>, distance: f64, rings: u32) -> Vec<Point2<f64>> {
    let rings = rings as i64;

    iproduct!(-rings..=rings, -rings..=rings)
        .map(|(i, j)| {
            Point2::new(
                centre.x + i as f64 * distance,
                centre.y + j as f64 * distance,
            )
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum BoreholeFieldError {
    #[error("A borehole field needs at least one borehole")]
    Empty,
    #[error("Borehole {name} has a non-finite coordinate ({x}, {y})")]
    NonFiniteCoordinate { name: String, x: f64, y: f64 },
    #[error("Could not read borehole locations: {0}")]
    UnreadableLocations(#[from] serde_json::Error),
}

/// The ordered, immutable set of borehole positions together with the radius at which
/// the ground temperature around each borehole is probed.
#[derive(Clone, Debug)]
pub struct BoreholeField {
    boreholes: IndexMap<String, Point2<f64>>,
    pipe_radius: f64,
}

impl BoreholeField {
    pub fn new(locations: Vec<Point2<f64>>, pipe_radius: f64) -> Result<Self, BoreholeFieldError> {
        if locations.is_empty() {
            return Err(BoreholeFieldError::Empty);
        }

        let boreholes: IndexMap<String, Point2<f64>> = locations
            .into_iter()
            .enumerate()
            .map(|(idx, location)| (format!("BH{:02}", idx + 1), location))
            .collect();

        if let Some((name, location)) = boreholes
            .iter()
            .find(|(_, location)| !(location.x.is_finite() && location.y.is_finite()))
        {
            return Err(BoreholeFieldError::NonFiniteCoordinate {
                name: name.clone(),
                x: location.x,
                y: location.y,
            });
        }

        Ok(Self {
            boreholes,
            pipe_radius,
        })
    }

    pub fn from_layout(
        layout: BoreholeLayout,
        centre: Point2<f64>,
        distance: f64,
        pipe_radius: f64,
    ) -> Result<Self, BoreholeFieldError> {
        Self::new(layout.locations(centre, distance), pipe_radius)
    }

    /// Read a JSON array of `[x, y]` pairs, as produced by the mesh generation step.
    pub fn from_locations_json(
        reader: impl Read,
        pipe_radius: f64,
    ) -> Result<Self, BoreholeFieldError> {
        let pairs: Vec<[f64; 2]> = serde_json::from_reader(reader)?;

        Self::new(
            pairs.into_iter().map(|[x, y]| Point2::new(x, y)).collect(),
            pipe_radius,
        )
    }

    pub fn len(&self) -> usize {
        self.boreholes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boreholes.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.boreholes.keys().map(String::as_str)
    }

    pub fn locations(&self) -> impl Iterator<Item = &Point2<f64>> {
        self.boreholes.values()
    }

    pub fn location_vec(&self) -> Vec<Point2<f64>> {
        self.boreholes.values().copied().collect()
    }

    pub fn pipe_radius(&self) -> f64 {
        self.pipe_radius
    }

    /// The four points at pipe-radius offset around a borehole where the ground
    /// temperature is sampled: (x - r, y), (x + r, y), (x, y - r), (x, y + r).
    pub fn probe_points(&self, location: &Point2<f64>) -> [Point2<f64>; 4] {
        let r = self.pipe_radius;
        [
            Point2::new(location.x - r, location.y),
            Point2::new(location.x + r, location.y),
            Point2::new(location.x, location.y - r),
            Point2::new(location.x, location.y + r),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    #[case(0, 1)]
    #[case(1, 7)]
    #[case(2, 19)]
    #[case(3, 37)]
    fn should_enumerate_hexagonal_layout(#[case] rings: u32, #[case] expected: usize) {
        let locations = BoreholeLayout::Hexagonal { rings }.locations(Point2::new(0., 0.), 5.);

        assert_eq!(locations.len(), expected);
    }

    #[rstest]
    fn should_place_hexagonal_neighbours_at_borehole_distance() {
        let centre = Point2::new(10., -4.);
        let locations = BoreholeLayout::Hexagonal { rings: 1 }.locations(centre, 6.);

        let neighbours: Vec<_> = locations
            .iter()
            .filter(|location| **location != centre)
            .collect();
        assert_eq!(neighbours.len(), 6);
        for neighbour in neighbours {
            assert_relative_eq!(nalgebra::distance(neighbour, &centre), 6., max_relative = 1e-12);
        }
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 9)]
    #[case(2, 25)]
    fn should_enumerate_square_layout(#[case] rings: u32, #[case] expected: usize) {
        let locations = BoreholeLayout::Square { rings }.locations(Point2::new(0., 0.), 5.);

        assert_eq!(locations.len(), expected);
    }

    #[rstest]
    fn should_order_square_layout_column_by_column() {
        let locations = BoreholeLayout::Square { rings: 1 }.locations(Point2::new(1., 2.), 3.);

        assert_eq!(locations[0], Point2::new(-2., -1.));
        assert_eq!(locations[1], Point2::new(-2., 2.));
        assert_eq!(locations[3], Point2::new(1., -1.));
        assert_eq!(locations[8], Point2::new(4., 5.));
    }

    #[rstest]
    fn should_name_boreholes_in_order() {
        let field = BoreholeField::from_layout(
            BoreholeLayout::Square { rings: 1 },
            Point2::new(0., 0.),
            5.,
            0.1,
        )
        .unwrap();

        let names: Vec<&str> = field.names().collect();
        assert_eq!(names.first(), Some(&"BH01"));
        assert_eq!(names.last(), Some(&"BH09"));
    }

    #[rstest]
    fn should_reject_empty_field() {
        assert!(matches!(
            BoreholeField::new(vec![], 0.1),
            Err(BoreholeFieldError::Empty)
        ));
        assert!(matches!(
            BoreholeField::from_locations_json("[]".as_bytes(), 0.1),
            Err(BoreholeFieldError::Empty)
        ));
    }

    #[rstest]
    fn should_read_locations_json() {
        let field =
            BoreholeField::from_locations_json("[[0.0, 1.5], [2.5, -3.0]]".as_bytes(), 0.2)
                .unwrap();

        assert_eq!(
            field.location_vec(),
            vec![Point2::new(0., 1.5), Point2::new(2.5, -3.)]
        );
        assert_eq!(field.pipe_radius(), 0.2);
    }

    #[rstest]
    fn should_reject_malformed_locations_json() {
        assert!(matches!(
            BoreholeField::from_locations_json("{\"x\": 1}".as_bytes(), 0.1),
            Err(BoreholeFieldError::UnreadableLocations(_))
        ));
    }

    #[rstest]
    fn should_offset_probe_points_by_pipe_radius() {
        let field = BoreholeField::new(vec![Point2::new(1., 1.)], 0.5).unwrap();

        assert_eq!(
            field.probe_points(&Point2::new(1., 1.)),
            [
                Point2::new(0.5, 1.),
                Point2::new(1.5, 1.),
                Point2::new(1., 0.5),
                Point2::new(1., 1.5),
            ]
        );
    }
}
