//! Single-band GeoTIFF codec for depth (`float32`) and extent (`uint8`)
//! rasters.
//!
//! Georeferencing uses `ModelPixelScale` and `ModelTiepoint`, the projection
//! comes from the GeoKey directory and nodata from the GDAL nodata tag. The
//! value type follows the sample type; an `ImageDescription` of the form
//! `fim_type=<depth|extent>`, when present, must agree with it.
#![expect(
    clippy::float_arithmetic,
    reason = "tiepoints are converted to grid origins with floating-point arithmetic"
)]

use std::io::{Read, Seek, Write};

use camino::Utf8Path;
use floodmosaic_core::{
    Crs, FimType, GridGeometry, PixelType, RasterObservation, Resolution, is_valid,
};
use geo::Coord;
use tiff::TiffError;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray8, Gray32Float};
use tiff::encoder::{Compression, DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;

use crate::IoError;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

const DESCRIPTION_PREFIX: &str = "fim_type=";

/// Decode a raster observation from `reader`.
///
/// `path` names the file in errors; `source_id` identifies the observation.
///
/// # Errors
/// - [`IoError::Tiff`] or [`IoError::Io`] when decoding fails.
/// - [`IoError::MissingGeoreference`] when scale, tiepoint or projection
///   keys are absent.
/// - [`IoError::UnsupportedPixelType`] for samples other than `float32` and
///   `uint8`, or when the description names the other value type.
/// - [`IoError::Mosaic`] when the decoded raster is inconsistent.
pub fn decode_raster<R: Read + Seek>(
    reader: R,
    path: &Utf8Path,
    source_id: &str,
) -> Result<RasterObservation, IoError> {
    let mut decoder = Decoder::new(reader).map_err(|err| IoError::tiff(path, err))?;
    let (width, height) = decoder.dimensions().map_err(|err| IoError::tiff(path, err))?;

    let scale = read_f64_tag(&mut decoder, path, MODEL_PIXEL_SCALE, "ModelPixelScale")?;
    let tiepoint = read_f64_tag(&mut decoder, path, MODEL_TIEPOINT, "ModelTiepoint")?;
    let geo_keys = decoder
        .find_tag_unsigned_vec::<u16>(Tag::Unknown(GEO_KEY_DIRECTORY))
        .map_err(|err| IoError::tiff(path, err))?
        .ok_or_else(|| missing(path, "GeoKeyDirectory"))?;
    let crs = crs_from_geo_keys(&geo_keys).ok_or_else(|| missing(path, "projection GeoKey"))?;
    let nodata_text = read_ascii_tag(&mut decoder, path, Tag::Unknown(GDAL_NODATA))?;
    let description = read_ascii_tag(&mut decoder, path, Tag::ImageDescription)?;

    let (fim_type, pixels) = match decoder.read_image().map_err(|err| IoError::tiff(path, err))? {
        DecodingResult::F32(values) => (FimType::Depth, values),
        DecodingResult::U8(values) => (FimType::Extent, values.into_iter().map(f32::from).collect()),
        _ => return Err(unsupported(path, "integer or float64")),
    };
    match description.as_deref().and_then(fim_type_from_description) {
        Some(FimType::Depth) if fim_type == FimType::Extent => {
            return Err(unsupported(path, "uint8 depth"));
        }
        Some(FimType::Extent) if fim_type == FimType::Depth => {
            return Err(unsupported(path, "float32 extent"));
        }
        _ => {}
    }
    let nodata = nodata_text
        .as_deref()
        .and_then(|text| text.trim_matches(|c: char| c.is_whitespace() || c == '\0').parse().ok())
        .unwrap_or_else(|| fim_type.nodata());

    let [scale_x, scale_y, ..] = scale.as_slice() else {
        return Err(missing(path, "ModelPixelScale"));
    };
    let [pixel_i, pixel_j, _, model_x, model_y, ..] = tiepoint.as_slice() else {
        return Err(missing(path, "ModelTiepoint"));
    };
    let resolution = Resolution::new(*scale_x, *scale_y)?;
    let origin = Coord {
        x: model_x - pixel_i * scale_x,
        y: model_y + pixel_j * scale_y,
    };
    let grid = GridGeometry::new(origin, resolution, to_usize(width), to_usize(height));
    Ok(RasterObservation::new(source_id, fim_type, crs, grid, nodata, pixels)?)
}

/// Encode `raster` as a single-band GeoTIFF.
///
/// Depth rasters are written as `float32` and extent rasters as `uint8`,
/// with nodata mapped to the canonical sentinel. LZW compression is used when
/// `compress` is set.
///
/// # Errors
/// Returns the codec error when encoding or writing fails.
pub fn encode_raster<W: Write + Seek>(
    raster: &RasterObservation,
    writer: W,
    compress: bool,
) -> Result<(), TiffError> {
    let compression = if compress {
        Compression::Lzw
    } else {
        Compression::Uncompressed
    };
    let mut encoder = TiffEncoder::new(writer)?.with_compression(compression);
    let grid = raster.grid();
    let width = u32::try_from(grid.width()).map_err(|_| TiffError::LimitsExceeded)?;
    let height = u32::try_from(grid.height()).map_err(|_| TiffError::LimitsExceeded)?;
    let nodata = raster.fim_type().nodata();

    match raster.pixel_type() {
        PixelType::Float32 => {
            let pixels: Vec<f32> = raster
                .pixels()
                .iter()
                .map(|value| if is_valid(*value, raster.nodata()) { *value } else { nodata })
                .collect();
            let mut image = encoder.new_image::<Gray32Float>(width, height)?;
            write_geo_tags(image.encoder(), raster)?;
            image.write_data(&pixels)
        }
        PixelType::UInt8 => {
            let bytes: Vec<u8> = raster
                .pixels()
                .iter()
                .map(|value| extent_byte(*value, raster.nodata()))
                .collect();
            let mut image = encoder.new_image::<Gray8>(width, height)?;
            write_geo_tags(image.encoder(), raster)?;
            image.write_data(&bytes)
        }
    }
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    raster: &RasterObservation,
) -> Result<(), TiffError> {
    let grid = raster.grid();
    let resolution = grid.resolution();
    let origin = grid.origin();
    let crs = raster.crs();
    let code = u16::try_from(crs.code()).map_err(|_| TiffError::LimitsExceeded)?;

    let scale = [resolution.x(), resolution.y(), 0.0];
    dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), scale.as_slice())?;
    let tiepoint = [0.0, 0.0, 0.0, origin.x, origin.y, 0.0];
    dir.write_tag(Tag::Unknown(MODEL_TIEPOINT), tiepoint.as_slice())?;

    let (model_type, crs_key) = if crs.is_geographic() {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_GEO_KEY)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_GEO_KEY)
    };
    let geo_keys: Vec<u16> = [
        [1, 1, 0, 3],
        [GT_MODEL_TYPE_GEO_KEY, 0, 1, model_type],
        [GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA],
        [crs_key, 0, 1, code],
    ]
    .concat();
    dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), geo_keys.as_slice())?;

    let nodata = raster.fim_type().nodata().to_string();
    dir.write_tag(Tag::Unknown(GDAL_NODATA), nodata.as_str())?;
    let description = format!("{DESCRIPTION_PREFIX}{}", raster.fim_type());
    dir.write_tag(Tag::ImageDescription, description.as_str())?;
    Ok(())
}

/// Projection named by the GeoKey directory, projected keys first.
fn crs_from_geo_keys(keys: &[u16]) -> Option<Crs> {
    let entries = keys.get(4..)?;
    let lookup = |wanted: u16| {
        entries.chunks_exact(4).find_map(|entry| match entry {
            [key, 0, _, value] if *key == wanted => Some(Crs::epsg(u32::from(*value))),
            _ => None,
        })
    };
    lookup(PROJECTED_CS_TYPE_GEO_KEY).or_else(|| lookup(GEOGRAPHIC_TYPE_GEO_KEY))
}

fn fim_type_from_description(description: &str) -> Option<FimType> {
    description
        .trim_end_matches('\0')
        .strip_prefix(DESCRIPTION_PREFIX)?
        .trim()
        .parse()
        .ok()
}

fn extent_byte(value: f32, nodata: f32) -> u8 {
    if !is_valid(value, nodata) {
        u8::MAX
    } else if value > 0.0 {
        1
    } else {
        0
    }
}

fn read_f64_tag<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    path: &Utf8Path,
    tag: u16,
    name: &'static str,
) -> Result<Vec<f64>, IoError> {
    decoder
        .find_tag(Tag::Unknown(tag))
        .map_err(|err| IoError::tiff(path, err))?
        .ok_or_else(|| missing(path, name))?
        .into_f64_vec()
        .map_err(|err| IoError::tiff(path, err))
}

fn read_ascii_tag<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    path: &Utf8Path,
    tag: Tag,
) -> Result<Option<String>, IoError> {
    decoder
        .find_tag(tag)
        .map_err(|err| IoError::tiff(path, err))?
        .map(tiff::decoder::ifd::Value::into_string)
        .transpose()
        .map_err(|err| IoError::tiff(path, err))
}

fn to_usize(value: u32) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

fn missing(path: &Utf8Path, tag: &'static str) -> IoError {
    IoError::MissingGeoreference {
        path: path.to_owned(),
        tag,
    }
}

fn unsupported(path: &Utf8Path, found: &'static str) -> IoError {
    IoError::UnsupportedPixelType {
        path: path.to_owned(),
        found,
    }
}
