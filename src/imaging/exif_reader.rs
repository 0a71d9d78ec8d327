//! EXIF capture metadata extraction.
//!
//! Reads the fields import stores on a photo: capture time (for `date`),
//! camera and lens, exposure settings, and GPS position. Uses
//! `kamadak-exif`, which understands JPEG, TIFF, PNG, WebP and HEIF
//! containers.
//!
//! A file without EXIF data yields an empty [`CaptureMetadata`]; only a file
//! that cannot be opened is an error.

use super::backend::{BackendError, CaptureMetadata};
use crate::types::Gps;
use chrono::NaiveDateTime;
use exif::{Exif, In, Rational, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Read capture metadata from an image file.
pub fn read_capture_metadata(path: &Path) -> Result<CaptureMetadata, BackendError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut reader_opts = exif::Reader::new();
    reader_opts.continue_on_error(true);

    let exif = match reader_opts
        .read_from_container(&mut reader)
        .or_else(|e| e.distill_partial_result(|_| {}))
    {
        Ok(exif) => exif,
        Err(_) => return Ok(CaptureMetadata::default()),
    };

    Ok(extract(&exif))
}

fn extract(exif: &Exif) -> CaptureMetadata {
    let captured_at = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime]
        .iter()
        .find_map(|tag| ascii_field(exif, *tag).and_then(|s| parse_exif_datetime(&s)));

    let camera = match (ascii_field(exif, Tag::Make), ascii_field(exif, Tag::Model)) {
        (Some(make), Some(model)) => Some(camera_name(&make, &model)),
        (None, Some(model)) => Some(model),
        (Some(make), None) => Some(make),
        (None, None) => None,
    };

    CaptureMetadata {
        captured_at,
        camera,
        lens: ascii_field(exif, Tag::LensModel),
        focal_length: rational_field(exif, Tag::FocalLength).map(format_focal_length),
        aperture: rational_field(exif, Tag::FNumber).map(format_aperture),
        shutter_speed: rational_field(exif, Tag::ExposureTime).map(format_exposure),
        iso: uint_field(exif, Tag::PhotographicSensitivity),
        gps: extract_gps(exif),
    }
}

fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(parts) => parts
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).trim_matches(char::from(0)).trim().to_string())
            .find(|s| !s.is_empty()),
        _ => None,
    }
}

fn rational_field(exif: &Exif, tag: Tag) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Rational(values) => values.first().and_then(rational_to_f64),
        _ => None,
    }
}

fn rational_to_f64(r: &Rational) -> Option<f64> {
    (r.denom != 0).then(|| r.num as f64 / r.denom as f64)
}

fn uint_field(exif: &Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)?.value.get_uint(0)
}

fn extract_gps(exif: &Exif) -> Option<Gps> {
    let latitude = gps_coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, "S")?;
    let longitude = gps_coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, "W")?;
    let altitude = rational_field(exif, Tag::GPSAltitude).map(|alt| {
        let below_sea_level = exif
            .get_field(Tag::GPSAltitudeRef, In::PRIMARY)
            .and_then(|f| f.value.get_uint(0))
            == Some(1);
        if below_sea_level { -alt } else { alt }
    });
    Some(Gps {
        latitude,
        longitude,
        altitude,
    })
}

fn gps_coordinate(exif: &Exif, tag: Tag, ref_tag: Tag, negative_ref: &str) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let parts: Vec<f64> = match &field.value {
        Value::Rational(values) => values.iter().filter_map(rational_to_f64).collect(),
        _ => return None,
    };
    let [degrees, minutes, seconds] = parts.as_slice() else {
        return None;
    };
    let value = dms_to_decimal(*degrees, *minutes, *seconds);
    let negative = ascii_field(exif, ref_tag).is_some_and(|r| r.eq_ignore_ascii_case(negative_ref));
    Some(if negative { -value } else { value })
}

/// Parse an EXIF timestamp.
///
/// The standard form is `YYYY:MM:DD HH:MM:SS`; some writers use dashes in
/// the date part instead.
pub fn parse_exif_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y:%m:%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// "Fujifilm" + "X100V" → "Fujifilm X100V"; a model that already names the
/// maker ("Canon EOS R5") is used as-is.
fn camera_name(make: &str, model: &str) -> String {
    let first_word = make.split_whitespace().next().unwrap_or(make);
    if model.to_lowercase().starts_with(&first_word.to_lowercase()) {
        model.to_string()
    } else {
        format!("{make} {model}")
    }
}

fn format_focal_length(mm: f64) -> String {
    format!("{}mm", trim_float(mm))
}

fn format_aperture(f_number: f64) -> String {
    format!("f/{}", trim_float(f_number))
}

/// Exposure time in seconds → `1/250s` for fast shutters, `2s` for slow ones.
pub fn format_exposure(seconds: f64) -> String {
    if seconds <= 0.0 {
        return "0s".to_string();
    }
    if seconds < 1.0 {
        format!("1/{}s", (1.0 / seconds).round() as u64)
    } else {
        format!("{}s", trim_float(seconds))
    }
}

fn trim_float(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded:.1}")
    }
}

/// Degrees/minutes/seconds → decimal degrees.
pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}
