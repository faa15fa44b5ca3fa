//! GPX 1.1 export of a single activity.
//!
//! Heart rate goes into the Garmin `TrackPointExtension`, which Strava reads.

use std::io::Write;

use thiserror::Error;

use crate::utils::gpx_time;
use crate::{ActivityDetail, ActivityType};

#[derive(Debug, Error)]
pub enum GpxError {
    #[error("track point {index} has a non-finite coordinate")]
    InvalidCoordinate { index: usize },
    #[error("writing gpx: {0}")]
    Io(#[from] std::io::Error),
}

const HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="runtastic-to-strava" xmlns="http://www.topografix.com/GPX/1/1" xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://www.topografix.com/GPX/1/1 http://www.topografix.com/GPX/1/1/gpx.xsd">
"#;

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn track_type(t: ActivityType) -> &'static str {
    match t {
        ActivityType::Running => "running",
        ActivityType::Biking => "biking",
        ActivityType::Swimming => "swimming",
        ActivityType::Walking => "walking",
        ActivityType::Other => "other",
    }
}

/// Write `detail` as a GPX document.
pub fn write<W: Write>(detail: &ActivityDetail, mut out: W) -> Result<(), GpxError> {
    out.write_all(HEADER.as_bytes())?;
    if let Some(start) = detail.first_point_time() {
        writeln!(out, "  <metadata><time>{}</time></metadata>", gpx_time(&start))?;
    }
    writeln!(out, "  <trk>")?;
    writeln!(out, "    <name>Runtastic activity {}</name>", escape(&detail.id))?;
    if let Some(notes) = detail.notes.as_deref().filter(|n| !n.is_empty()) {
        writeln!(out, "    <desc>{}</desc>", escape(notes))?;
    }
    writeln!(out, "    <type>{}</type>", track_type(detail.activity_type))?;
    writeln!(out, "    <trkseg>")?;
    for (index, p) in detail.track_points.iter().enumerate() {
        if !p.latitude.is_finite() || !p.longitude.is_finite() {
            return Err(GpxError::InvalidCoordinate { index });
        }
        writeln!(
            out,
            r#"      <trkpt lat="{:.7}" lon="{:.7}">"#,
            p.latitude, p.longitude
        )?;
        if let Some(ele) = p.elevation.filter(|e| e.is_finite()) {
            writeln!(out, "        <ele>{ele:.1}</ele>")?;
        }
        writeln!(out, "        <time>{}</time>", gpx_time(&p.time))?;
        if let Some(hr) = p.heart_rate {
            writeln!(
                out,
                "        <extensions><gpxtpx:TrackPointExtension><gpxtpx:hr>{hr}</gpxtpx:hr></gpxtpx:TrackPointExtension></extensions>"
            )?;
        }
        writeln!(out, "      </trkpt>")?;
    }
    writeln!(out, "    </trkseg>")?;
    writeln!(out, "  </trk>")?;
    writeln!(out, "</gpx>")?;
    Ok(())
}

/// Encode `detail` into an in-memory GPX buffer.
pub fn encode(detail: &ActivityDetail) -> Result<Vec<u8>, GpxError> {
    let mut buf = Vec::with_capacity(256 + detail.track_points.len() * 128);
    write(detail, &mut buf)?;
    Ok(buf)
}
