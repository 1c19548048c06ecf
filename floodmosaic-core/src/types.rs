//! Shared vocabulary for flood observations: value types, projections,
//! geometry kinds and feature attributes.

use std::fmt;
use std::str::FromStr;

use geo::Geometry;
use indexmap::IndexMap;
use thiserror::Error;

/// Flood inundation map representation.
///
/// # Examples
///
/// ```
/// use floodmosaic_core::FimType;
///
/// let fim: FimType = "extent".parse().expect("known fim type");
/// assert_eq!(fim.nodata(), 255.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FimType {
    /// Continuous water depth, stored as `float32`.
    Depth,
    /// Binary flooded/dry extent, stored as `uint8`.
    Extent,
}

impl FimType {
    /// Canonical nodata sentinel for depth rasters.
    pub const DEPTH_NODATA: f32 = -9999.0;
    /// Canonical nodata sentinel for extent rasters.
    pub const EXTENT_NODATA: f32 = 255.0;

    /// Canonical nodata sentinel for this value type.
    #[must_use]
    pub const fn nodata(self) -> f32 {
        match self {
            Self::Depth => Self::DEPTH_NODATA,
            Self::Extent => Self::EXTENT_NODATA,
        }
    }

    /// Pixel type used when this value type is stored as a raster.
    #[must_use]
    pub const fn pixel_type(self) -> PixelType {
        match self {
            Self::Depth => PixelType::Float32,
            Self::Extent => PixelType::UInt8,
        }
    }

    /// Lowercase name used in metadata and configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Depth => "depth",
            Self::Extent => "extent",
        }
    }
}

impl fmt::Display for FimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`FimType`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown fim type `{value}` (expected `depth` or `extent`)")]
pub struct ParseFimTypeError {
    /// Rejected input.
    pub value: String,
}

impl FromStr for FimType {
    type Err = ParseFimTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "depth" => Ok(Self::Depth),
            "extent" => Ok(Self::Extent),
            _ => Err(ParseFimTypeError {
                value: s.to_owned(),
            }),
        }
    }
}

/// Storage type of raster pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    /// 32-bit IEEE float.
    Float32,
    /// Unsigned byte.
    UInt8,
}

/// Coordinate reference system identified by its EPSG code.
///
/// Only equality is ever checked; the engine never reprojects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Crs(u32);

impl Crs {
    /// NAD83 / Conus Albers, the projection used by the HAND inundation stack.
    pub const CONUS_ALBERS: Self = Self(5070);
    /// WGS 84 geographic coordinates.
    pub const WGS84: Self = Self(4326);

    /// Wrap an EPSG code.
    #[must_use]
    pub const fn epsg(code: u32) -> Self {
        Self(code)
    }

    /// The EPSG code.
    #[must_use]
    pub const fn code(self) -> u32 {
        self.0
    }

    /// Whether the code names a geographic (lon/lat) system.
    #[must_use]
    pub const fn is_geographic(self) -> bool {
        matches!(self.0, 4258 | 4267 | 4269 | 4326 | 4979)
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::CONUS_ALBERS
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Vector geometry kinds accepted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum GeometryKind {
    /// Single point.
    Point,
    /// Collection of points sharing one value.
    MultiPoint,
    /// Single polygon.
    Polygon,
    /// Collection of polygons sharing one value.
    MultiPolygon,
}

impl GeometryKind {
    /// Kind of a `geo` geometry, or `None` for unsupported variants.
    #[must_use]
    pub const fn of(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Point(_) => Some(Self::Point),
            Geometry::MultiPoint(_) => Some(Self::MultiPoint),
            Geometry::Polygon(_) => Some(Self::Polygon),
            Geometry::MultiPolygon(_) => Some(Self::MultiPolygon),
            _ => None,
        }
    }

    /// Polygon or multipolygon.
    #[must_use]
    pub const fn is_polygonal(self) -> bool {
        matches!(self, Self::Polygon | Self::MultiPolygon)
    }

    /// Whether a feature of `other` kind may live in a layer of this kind.
    #[must_use]
    pub const fn admits(self, other: Self) -> bool {
        self.is_polygonal() == other.is_polygonal()
    }

    /// Lowercase name matching the `layer_type` vocabulary.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::MultiPoint => "multipoint",
            Self::Polygon => "polygon",
            Self::MultiPolygon => "multipolygon",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of any `geo` geometry variant, used in diagnostics.
#[must_use]
pub const fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "point",
        Geometry::Line(_) => "line",
        Geometry::LineString(_) => "linestring",
        Geometry::Polygon(_) => "polygon",
        Geometry::MultiPoint(_) => "multipoint",
        Geometry::MultiLineString(_) => "multilinestring",
        Geometry::MultiPolygon(_) => "multipolygon",
        Geometry::GeometryCollection(_) => "geometrycollection",
        Geometry::Rect(_) => "rect",
        Geometry::Triangle(_) => "triangle",
    }
}

/// Typed flood attribute carried by every vector feature.
///
/// Serialised as a bare number for depth and a boolean for extent.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum FloodValue {
    /// Water depth in CRS vertical units.
    Depth(f64),
    /// Flooded (`true`) or dry (`false`).
    Extent(bool),
}

impl FloodValue {
    /// Value type of this attribute.
    #[must_use]
    pub const fn fim_type(self) -> FimType {
        match self {
            Self::Depth(_) => FimType::Depth,
            Self::Extent(_) => FimType::Extent,
        }
    }

    /// Whether `self` strictly outranks `other` under the max merge.
    ///
    /// Depth compares numerically, with NaN below every number, and extent
    /// treats flooded as greater than dry. Values of different types never
    /// outrank each other.
    #[must_use]
    pub fn outranks(self, other: Self) -> bool {
        match (self, other) {
            (Self::Depth(a), Self::Depth(b)) => !a.is_nan() && (b.is_nan() || a > b),
            (Self::Extent(a), Self::Extent(b)) => a && !b,
            _ => false,
        }
    }
}

/// Pass-through attribute value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum AttributeValue {
    /// Explicit null.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// Free text.
    Text(String),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Insertion-ordered pass-through attributes with unique keys.
pub type Attributes = IndexMap<String, AttributeValue>;
