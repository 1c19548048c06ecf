//! Vector observations, their features and the optional clip boundary.

use geo::{BoundingRect, Coord, Geometry, Intersects, MultiPolygon, Point, Polygon, Rect};

use crate::classify::classify_geometry;
use crate::{AttributeValue, Attributes, Crs, FimType, FloodValue, GeometryKind, MosaicError};

/// A single vector feature with its flood value and pass-through attributes.
///
/// # Examples
///
/// ```
/// use floodmosaic_core::{FloodFeature, FloodValue};
/// use geo::point;
///
/// let feature = FloodFeature::new(point!(x: 1.0, y: 2.0).into(), FloodValue::Depth(0.4))
///     .with_attribute("gauge", "ABC1");
/// assert_eq!(feature.attributes.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FloodFeature {
    /// Feature geometry in the canonical projection.
    pub geometry: Geometry<f64>,
    /// Depth or extent attribute.
    pub value: FloodValue,
    /// Attributes carried through the merge untouched.
    pub attributes: Attributes,
}

impl FloodFeature {
    /// Feature without pass-through attributes.
    #[must_use]
    pub fn new(geometry: Geometry<f64>, value: FloodValue) -> Self {
        Self {
            geometry,
            value,
            attributes: Attributes::new(),
        }
    }

    /// Add or replace a pass-through attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Geometry kind, or `None` for unsupported geometries.
    #[must_use]
    pub const fn kind(&self) -> Option<GeometryKind> {
        GeometryKind::of(&self.geometry)
    }

    /// Coordinates of a point or multipoint feature; empty for polygons.
    #[must_use]
    pub fn point_coords(&self) -> Vec<Coord<f64>> {
        match &self.geometry {
            Geometry::Point(point) => vec![point.0],
            Geometry::MultiPoint(points) => points.iter().map(|point| point.0).collect(),
            _ => Vec::new(),
        }
    }
}

/// Ordered collection of features sharing one geometry family and value type.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorObservation {
    source_id: String,
    fim_type: FimType,
    crs: Crs,
    kind: GeometryKind,
    features: Vec<FloodFeature>,
}

impl VectorObservation {
    /// Validate and construct a vector observation.
    ///
    /// Point layers may mix points and multipoints; polygon layers may mix
    /// polygons and multipolygons.
    ///
    /// # Errors
    /// - [`MosaicError::UnsupportedGeometry`] for geometries outside the four
    ///   supported kinds or outside the layer's family.
    /// - [`MosaicError::TypeMismatch`] when a feature value does not match
    ///   `fim_type`.
    pub fn new(
        source_id: impl Into<String>,
        fim_type: FimType,
        crs: Crs,
        kind: GeometryKind,
        features: Vec<FloodFeature>,
    ) -> Result<Self, MosaicError> {
        let id = source_id.into();
        for feature in &features {
            let feature_kind = classify_geometry(&feature.geometry, &id)?;
            if !kind.admits(feature_kind) {
                return Err(MosaicError::UnsupportedGeometry {
                    source_id: id,
                    geometry: format!("{feature_kind} in a {kind} layer"),
                });
            }
            if feature.value.fim_type() != fim_type {
                return Err(MosaicError::TypeMismatch {
                    source_id: id,
                    expected: fim_type,
                    found: feature.value.fim_type(),
                });
            }
        }
        Ok(Self {
            source_id: id,
            fim_type,
            crs,
            kind,
            features,
        })
    }

    /// Identifier of the source this layer came from.
    #[must_use]
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Value type of every feature.
    #[must_use]
    pub const fn fim_type(&self) -> FimType {
        self.fim_type
    }

    /// Projection.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// Declared layer kind.
    #[must_use]
    pub const fn kind(&self) -> GeometryKind {
        self.kind
    }

    /// Features in input order.
    #[must_use]
    pub fn features(&self) -> &[FloodFeature] {
        &self.features
    }

    /// Bounding box of every feature, or `None` for an empty layer.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.features
            .iter()
            .filter_map(|feature| feature.geometry.bounding_rect())
            .reduce(crate::grid::union)
    }

    /// Consume the layer, returning its features.
    #[must_use]
    pub fn into_features(self) -> Vec<FloodFeature> {
        self.features
    }

    /// Rebuild the layer with transformed features, keeping provenance.
    pub(crate) fn map_features(
        self,
        fim_type: FimType,
        map: impl FnMut(FloodFeature) -> FloodFeature,
    ) -> Self {
        Self {
            fim_type,
            features: self.features.into_iter().map(map).collect(),
            ..self
        }
    }
}

/// Polygonal boundary trimming the mosaic.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipBoundary {
    area: MultiPolygon<f64>,
    bounds: Option<Rect<f64>>,
    crs: Crs,
}

impl ClipBoundary {
    /// Source identifier used for clip boundaries in diagnostics.
    pub const SOURCE_ID: &'static str = "clip boundary";

    /// Build a boundary from a polygon or multipolygon geometry.
    ///
    /// # Errors
    /// Returns [`MosaicError::UnsupportedGeometry`] for any other geometry.
    pub fn new(geometry: Geometry<f64>, crs: Crs) -> Result<Self, MosaicError> {
        match geometry {
            Geometry::Polygon(polygon) => Ok(Self::from_polygons(vec![polygon], crs)),
            Geometry::MultiPolygon(polygons) => Ok(Self::from_polygons(polygons.0, crs)),
            other => Err(MosaicError::UnsupportedGeometry {
                source_id: Self::SOURCE_ID.to_owned(),
                geometry: crate::geometry_name(&other).to_owned(),
            }),
        }
    }

    /// Build a boundary from the union of several polygons.
    #[must_use]
    pub fn from_polygons(polygons: Vec<Polygon<f64>>, crs: Crs) -> Self {
        let area = MultiPolygon::new(polygons);
        let bounds = area.bounding_rect();
        Self { area, bounds, crs }
    }

    /// Boundary area.
    #[must_use]
    pub const fn area(&self) -> &MultiPolygon<f64> {
        &self.area
    }

    /// Projection.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// Bounding box, `None` for an empty boundary.
    #[must_use]
    pub const fn bounds(&self) -> Option<Rect<f64>> {
        self.bounds
    }

    /// Whether the boundary covers `coord` (edges inclusive).
    #[must_use]
    pub fn covers(&self, coord: Coord<f64>) -> bool {
        let Some(bounds) = self.bounds else {
            return false;
        };
        bounds.intersects(&coord) && self.area.intersects(&Point::from(coord))
    }
}
