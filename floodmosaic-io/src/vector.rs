//! JSON vector containers.
//!
//! A container carries its layer type, value type, projection and features:
//!
//! ```json
//! {
//!   "layer_type": "point",
//!   "fim_type": "depth",
//!   "crs": 5070,
//!   "features": [
//!     { "geometry": { "Point": { "x": 1.0, "y": 2.0 } }, "value": 0.4, "attributes": { "gauge": "A1" } }
//!   ]
//! }
//! ```
//!
//! A bare JSON array of geometries is accepted as well. Its features record
//! flood presence and its projection is the caller's canonical one.

use std::io::{Read, Write};

use camino::Utf8Path;
use floodmosaic_core::{
    Attributes, ClipBoundary, Crs, FimType, FloodFeature, FloodValue, GeometryKind, MosaicError,
    VectorMosaic, VectorObservation, geometry_name,
};
use geo::{Geometry, Polygon};
use serde::{Deserialize, Serialize};

use crate::IoError;

/// `layer_type` written for collections holding more than one kind.
pub const MIXED_LAYER: &str = "mixed";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VectorFile {
    Layer(LayerDocument),
    Geometries(Vec<Geometry<f64>>),
}

#[derive(Debug, Deserialize)]
struct LayerDocument {
    layer_type: String,
    fim_type: FimType,
    crs: Crs,
    features: Vec<FeatureDocument>,
}

#[derive(Debug, Deserialize)]
struct FeatureDocument {
    geometry: Geometry<f64>,
    value: FloodValue,
    #[serde(default)]
    attributes: Attributes,
}

#[derive(Debug, Serialize)]
struct LayerOutput<'a> {
    layer_type: &'a str,
    fim_type: FimType,
    crs: Crs,
    geometry_types: Vec<GeometryKind>,
    features: Vec<FeatureOutput<'a>>,
}

#[derive(Debug, Serialize)]
struct FeatureOutput<'a> {
    geometry: &'a Geometry<f64>,
    value: FloodValue,
    attributes: &'a Attributes,
}

/// Decode a vector observation.
///
/// # Errors
/// - [`IoError::Json`] or [`IoError::Io`] when the document cannot be read.
/// - [`IoError::EmptyLayer`] when no features are present.
/// - [`IoError::MixedLayer`] when point and polygon features are combined.
/// - [`IoError::Mosaic`] when the features fail validation.
pub fn decode_layer<R: Read>(
    reader: R,
    path: &Utf8Path,
    source_id: &str,
    canonical_crs: Crs,
) -> Result<VectorObservation, IoError> {
    let file: VectorFile =
        serde_json::from_reader(reader).map_err(|source| IoError::json(path, source))?;
    let (fim_type, crs, features): (_, _, Vec<FloodFeature>) = match file {
        VectorFile::Layer(layer) => {
            if layer.layer_type == MIXED_LAYER {
                return Err(IoError::MixedLayer {
                    path: path.to_owned(),
                });
            }
            let features = layer
                .features
                .into_iter()
                .map(|feature| FloodFeature {
                    geometry: feature.geometry,
                    value: feature.value,
                    attributes: feature.attributes,
                })
                .collect();
            (layer.fim_type, layer.crs, features)
        }
        VectorFile::Geometries(geometries) => {
            let features = geometries
                .into_iter()
                .map(|geometry| FloodFeature::new(geometry, FloodValue::Extent(true)))
                .collect();
            (FimType::Extent, canonical_crs, features)
        }
    };
    let kind = layer_kind(&features, path, source_id)?;
    Ok(VectorObservation::new(source_id, fim_type, crs, kind, features)?)
}

/// Decode a clip boundary, combining every polygon the document holds.
///
/// # Errors
/// - [`IoError::Json`] or [`IoError::Io`] when the document cannot be read.
/// - [`IoError::EmptyLayer`] when no polygons are present.
/// - [`IoError::Mosaic`] for non-polygonal geometries.
pub fn decode_boundary<R: Read>(
    reader: R,
    path: &Utf8Path,
    canonical_crs: Crs,
) -> Result<ClipBoundary, IoError> {
    let file: VectorFile =
        serde_json::from_reader(reader).map_err(|source| IoError::json(path, source))?;
    let (crs, geometries): (Crs, Vec<Geometry<f64>>) = match file {
        VectorFile::Layer(layer) => (
            layer.crs,
            layer.features.into_iter().map(|feature| feature.geometry).collect(),
        ),
        VectorFile::Geometries(geometries) => (canonical_crs, geometries),
    };
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    for geometry in geometries {
        match geometry {
            Geometry::Polygon(polygon) => polygons.push(polygon),
            Geometry::MultiPolygon(parts) => polygons.extend(parts),
            other => {
                return Err(MosaicError::UnsupportedGeometry {
                    source_id: ClipBoundary::SOURCE_ID.to_owned(),
                    geometry: geometry_name(&other).to_owned(),
                }
                .into());
            }
        }
    }
    if polygons.is_empty() {
        return Err(IoError::EmptyLayer {
            path: path.to_owned(),
        });
    }
    Ok(ClipBoundary::from_polygons(polygons, crs))
}

/// Encode a merged feature collection.
///
/// `layer_type` names the single kind present or is [`MIXED_LAYER`];
/// `geometry_types` lists every kind present.
///
/// # Errors
/// Returns the serialiser error when writing fails.
pub fn encode_mosaic<W: Write>(mosaic: &VectorMosaic, writer: W) -> Result<(), serde_json::Error> {
    let document = LayerOutput {
        layer_type: mosaic.layer_kind().map_or(MIXED_LAYER, GeometryKind::as_str),
        fim_type: mosaic.fim_type,
        crs: mosaic.crs,
        geometry_types: mosaic.geometry_kinds(),
        features: mosaic
            .features
            .iter()
            .map(|feature| FeatureOutput {
                geometry: &feature.geometry,
                value: feature.value,
                attributes: &feature.attributes,
            })
            .collect(),
    };
    serde_json::to_writer_pretty(writer, &document)
}

/// Layer kind admitting every feature: the first feature's kind.
fn layer_kind(
    features: &[FloodFeature],
    path: &Utf8Path,
    source_id: &str,
) -> Result<GeometryKind, IoError> {
    let Some(first) = features.first() else {
        return Err(IoError::EmptyLayer {
            path: path.to_owned(),
        });
    };
    let kind = first.kind().ok_or_else(|| MosaicError::UnsupportedGeometry {
        source_id: source_id.to_owned(),
        geometry: geometry_name(&first.geometry).to_owned(),
    })?;
    let mixed = features
        .iter()
        .filter_map(FloodFeature::kind)
        .any(|other| !kind.admits(other));
    if mixed {
        return Err(IoError::MixedLayer {
            path: path.to_owned(),
        });
    }
    Ok(kind)
}
