//! Casting rules that reconcile mixed geometry kinds and value types.
//!
//! Polygons force extent output. When they take part, every other vector
//! feature degrades to extent presence ([`PolygonPresencePolicy`]). Points
//! from any number of layers collapse onto unique locations
//! ([`VectorCaster::merge_points`]), keeping the winning value and the union
//! of their attributes.
#![expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "vectorised cell runs are placed in CRS coordinates"
)]

use geo::{Coord, Geometry, Point, Rect};
use log::debug;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::{
    Attributes, FimType, FloodFeature, FloodValue, MosaicError, RasterObservation,
    VectorObservation, geometry_name, is_valid,
};

/// Extent value of a depth cell: wet above zero, dry otherwise.
///
/// Nodata and NaN map to the extent nodata sentinel.
#[must_use]
pub fn cast_depth_cell(value: f32, nodata: f32) -> f32 {
    if !is_valid(value, nodata) {
        FimType::EXTENT_NODATA
    } else if value > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Degrades vector values to extent presence whenever polygons take part.
///
/// Point values are discarded: a depth gauge next to a surveyed flood polygon
/// contributes only the fact that the location was wet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolygonPresencePolicy {
    polygons_present: bool,
}

impl PolygonPresencePolicy {
    /// Policy for a set of inputs that does or does not contain polygons.
    #[must_use]
    pub const fn new(polygons_present: bool) -> Self {
        Self { polygons_present }
    }

    /// Whether the policy rewrites values.
    #[must_use]
    pub const fn is_active(self) -> bool {
        self.polygons_present
    }

    /// Apply the policy to one layer.
    #[must_use]
    pub fn apply(self, layer: VectorObservation) -> VectorObservation {
        if !self.polygons_present {
            return layer;
        }
        layer.map_features(FimType::Extent, |feature| FloodFeature {
            value: FloodValue::Extent(true),
            ..feature
        })
    }
}

/// Point deduplication and attribute reconciliation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorCaster {
    tolerance: f64,
}

type Anchor = GeomWithData<[f64; 2], usize>;

impl VectorCaster {
    /// Caster treating points within `tolerance` of each other as one.
    ///
    /// A tolerance of zero deduplicates exact coordinates only.
    #[must_use]
    pub const fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Explode multipoints and merge points sharing a location.
    ///
    /// A point joins the group whose first point lies within the tolerance;
    /// otherwise it starts a new group. Each group becomes one point feature
    /// at its first location. Depth merges by maximum and extent by logical
    /// or. Attributes are the union of the group's keys; collisions take the
    /// value from the feature holding the winning value, and ties go to the
    /// earliest feature.
    #[must_use]
    pub fn merge_points<'a>(
        &self,
        features: impl IntoIterator<Item = &'a FloodFeature>,
    ) -> Vec<FloodFeature> {
        let reach = self.tolerance * self.tolerance;
        let mut index: RTree<Anchor> = RTree::new();
        let mut groups: Vec<(Coord<f64>, Vec<&FloodFeature>)> = Vec::new();
        let mut exploded = 0_usize;

        for feature in features {
            for coord in feature.point_coords() {
                exploded += 1;
                let position = [coord.x, coord.y];
                let existing = index
                    .nearest_neighbor(&position)
                    .filter(|anchor| squared_distance(*anchor.geom(), position) <= reach)
                    .map(|anchor| anchor.data);
                let group = existing.unwrap_or_else(|| {
                    let fresh = groups.len();
                    index.insert(Anchor::new(position, fresh));
                    groups.push((coord, Vec::new()));
                    fresh
                });
                if let Some((_, members)) = groups.get_mut(group) {
                    members.push(feature);
                }
            }
        }
        debug!("merged {exploded} points into {} locations", groups.len());

        groups
            .into_iter()
            .filter_map(|(anchor, members)| merge_group(anchor, &members))
            .collect()
    }

    /// Every point feature of `layers` merged, in layer order.
    #[must_use]
    pub fn merge_layers(&self, layers: &[VectorObservation]) -> Vec<FloodFeature> {
        self.merge_points(layers.iter().flat_map(VectorObservation::features))
    }
}

fn squared_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let [ax, ay] = a;
    let [bx, by] = b;
    (ax - bx).powi(2) + (ay - by).powi(2)
}

fn merge_group(anchor: Coord<f64>, members: &[&FloodFeature]) -> Option<FloodFeature> {
    let winner = members.iter().copied().reduce(|best, candidate| {
        if candidate.value.outranks(best.value) {
            candidate
        } else {
            best
        }
    })?;
    let mut attributes: Attributes = winner.attributes.clone();
    for member in members {
        for (key, value) in &member.attributes {
            if !attributes.contains_key(key) {
                attributes.insert(key.clone(), value.clone());
            }
        }
    }
    Some(FloodFeature {
        geometry: Point::from(anchor).into(),
        value: winner.value,
        attributes,
    })
}

/// The greater of two values under the max merge; ties keep `current`.
#[must_use]
pub fn merge_value(current: FloodValue, incoming: FloodValue) -> FloodValue {
    if incoming.outranks(current) {
        incoming
    } else {
        current
    }
}

/// Reject features whose geometry left the four supported kinds.
///
/// # Errors
/// Returns [`MosaicError::GeometryCastConflict`] naming the first offending
/// geometry.
pub fn ensure_castable(features: &[FloodFeature], source_id: &str) -> Result<(), MosaicError> {
    features
        .iter()
        .find(|feature| feature.kind().is_none())
        .map_or(Ok(()), |feature| {
            Err(MosaicError::GeometryCastConflict {
                source_id: source_id.to_owned(),
                geometry: geometry_name(&feature.geometry).to_owned(),
            })
        })
}

/// Polygons covering the flooded cells of an extent raster, one per run of
/// consecutive flooded cells in a row.
#[must_use]
pub fn flooded_runs(raster: &RasterObservation) -> Vec<FloodFeature> {
    let grid = raster.grid();
    let (rx, ry) = (grid.resolution().x(), grid.resolution().y());
    let origin = grid.origin();
    let mut runs = Vec::new();
    for row in 0..grid.height() {
        let mut start = None;
        for col in 0..=grid.width() {
            let wet = raster.valid_pixel(col, row).is_some_and(|value| value > 0.0);
            match (wet, start) {
                (true, None) => start = Some(col),
                (false, Some(first)) => {
                    let top = origin.y - row as f64 * ry;
                    let rect = Rect::new(
                        Coord {
                            x: origin.x + first as f64 * rx,
                            y: top - ry,
                        },
                        Coord {
                            x: origin.x + col as f64 * rx,
                            y: top,
                        },
                    );
                    runs.push(FloodFeature::new(
                        Geometry::Polygon(rect.to_polygon()),
                        FloodValue::Extent(true),
                    ));
                    start = None;
                }
                _ => {}
            }
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AttributeValue, Crs, GeometryKind, GridGeometry, Resolution};
    use geo::{BoundingRect, LineString, MultiPoint, point};
    use rstest::rstest;

    #[rstest]
    #[case(2.5, 1.0)]
    #[case(0.0, 0.0)]
    #[case(-0.3, 0.0)]
    #[case(-9999.0, 255.0)]
    #[case(f32::NAN, 255.0)]
    fn depth_cells_cast_to_extent(#[case] depth: f32, #[case] expected: f32) {
        assert_eq!(cast_depth_cell(depth, -9999.0), expected);
    }

    #[rstest]
    fn presence_policy_discards_depth() {
        let layer = VectorObservation::new(
            "gauges",
            FimType::Depth,
            Crs::default(),
            GeometryKind::Point,
            vec![FloodFeature::new(point!(x: 1.0, y: 1.0).into(), FloodValue::Depth(3.2))],
        )
        .expect("valid layer");
        let cast = PolygonPresencePolicy::new(true).apply(layer.clone());
        assert_eq!(cast.fim_type(), FimType::Extent);
        assert_eq!(cast.features()[0].value, FloodValue::Extent(true));
        assert_eq!(PolygonPresencePolicy::new(false).apply(layer.clone()), layer);
    }

    #[rstest]
    fn multipoints_explode_and_merge_by_max() {
        let multi = MultiPoint::from(vec![(0.0, 0.0), (5.0, 5.0)]);
        let features = [
            FloodFeature::new(multi.into(), FloodValue::Depth(1.0)).with_attribute("src", "a"),
            FloodFeature::new(point!(x: 5.0, y: 5.0).into(), FloodValue::Depth(2.0))
                .with_attribute("src", "b"),
        ];
        let merged = VectorCaster::new(0.0).merge_points(&features);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].value, FloodValue::Depth(1.0));
        assert_eq!(merged[1].value, FloodValue::Depth(2.0));
        assert_eq!(merged[1].attributes["src"], AttributeValue::from("b"));
        assert_eq!(merged[1].geometry, Geometry::Point(point!(x: 5.0, y: 5.0)));
    }

    #[rstest]
    #[case(0.0, 2)]
    #[case(0.6, 1)]
    fn tolerance_controls_deduplication(#[case] tolerance: f64, #[case] expected: usize) {
        let features = [
            FloodFeature::new(point!(x: 0.0, y: 0.0).into(), FloodValue::Extent(false)),
            FloodFeature::new(point!(x: 0.3, y: 0.4).into(), FloodValue::Extent(true)),
        ];
        let merged = VectorCaster::new(tolerance).merge_points(&features);
        assert_eq!(merged.len(), expected);
        if expected == 1 {
            assert_eq!(merged[0].value, FloodValue::Extent(true));
            assert_eq!(merged[0].geometry, Geometry::Point(point!(x: 0.0, y: 0.0)));
        }
    }

    #[rstest]
    fn attribute_ties_go_to_first_input() {
        let features = [
            FloodFeature::new(point!(x: 1.0, y: 1.0).into(), FloodValue::Depth(2.0))
                .with_attribute("gauge", "first")
                .with_attribute("agency", "usgs"),
            FloodFeature::new(point!(x: 1.0, y: 1.0).into(), FloodValue::Depth(2.0))
                .with_attribute("gauge", "second")
                .with_attribute("crew", 7_i64),
        ];
        let merged = VectorCaster::new(0.0).merge_points(&features);
        let attributes = &merged[0].attributes;
        assert_eq!(attributes["gauge"], AttributeValue::from("first"));
        let keys: Vec<&str> = attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, ["gauge", "agency", "crew"]);
    }

    #[rstest]
    fn nan_depths_never_win_a_group() {
        let features = [
            FloodFeature::new(point!(x: 1.0, y: 1.0).into(), FloodValue::Depth(f64::NAN))
                .with_attribute("gauge", "broken"),
            FloodFeature::new(point!(x: 1.0, y: 1.0).into(), FloodValue::Depth(0.2))
                .with_attribute("gauge", "working"),
        ];
        let merged = VectorCaster::new(0.0).merge_points(&features);
        assert_eq!(merged[0].value, FloodValue::Depth(0.2));
        assert_eq!(merged[0].attributes["gauge"], AttributeValue::from("working"));
    }

    #[rstest]
    fn winning_value_supplies_colliding_attributes() {
        let features = [
            FloodFeature::new(point!(x: 1.0, y: 1.0).into(), FloodValue::Depth(0.5))
                .with_attribute("gauge", "shallow"),
            FloodFeature::new(point!(x: 1.0, y: 1.0).into(), FloodValue::Depth(1.5))
                .with_attribute("gauge", "deep"),
        ];
        let merged = VectorCaster::new(0.0).merge_points(&features);
        assert_eq!(merged[0].attributes["gauge"], AttributeValue::from("deep"));
    }

    #[rstest]
    fn lines_are_cast_conflicts() {
        let features = [FloodFeature::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]).into(),
            FloodValue::Extent(true),
        )];
        assert!(matches!(
            ensure_castable(&features, "lines"),
            Err(MosaicError::GeometryCastConflict { .. })
        ));
    }

    #[rstest]
    fn runs_cover_flooded_cells() {
        let grid = GridGeometry::new(
            Coord { x: 0.0, y: 2.0 },
            Resolution::square(1.0).expect("positive resolution"),
            3,
            2,
        );
        let raster = RasterObservation::new(
            "extent",
            FimType::Extent,
            Crs::default(),
            grid,
            255.0,
            vec![1.0, 1.0, 0.0, 255.0, 0.0, 1.0],
        )
        .expect("valid raster");
        let runs = flooded_runs(&raster);
        assert_eq!(runs.len(), 2);
        assert_eq!(
            runs[0].geometry.bounding_rect(),
            Some(Rect::new(Coord { x: 0.0, y: 1.0 }, Coord { x: 2.0, y: 2.0 }))
        );
        assert_eq!(
            runs[1].geometry.bounding_rect(),
            Some(Rect::new(Coord { x: 2.0, y: 0.0 }, Coord { x: 3.0, y: 1.0 }))
        );
    }
}
