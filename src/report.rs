//! Caller-side collaborators: decoding uploaded sheets and persisting the
//! overlay and result summary of a graded sheet.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::RgbImage;
use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;

use crate::{
    decision::Answer,
    grade::GradingResult,
    scoring::SubjectScores,
    types::QuestionNumber,
};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unable to read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("unable to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("unsupported sheet format: {0}")]
    UnsupportedFormat(String),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("unable to write {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("unable to serialize result: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decodes PNG, JPEG or any other raster format `image` supports into an RGB
/// sheet. PDF pages must be rasterized before they get here.
pub fn decode_sheet(bytes: &[u8], extension: Option<&str>) -> Result<RgbImage, DecodeError> {
    if let Some(extension) = extension {
        if extension.eq_ignore_ascii_case("pdf") {
            return Err(DecodeError::UnsupportedFormat(
                "PDF pages must be rasterized first".into(),
            ));
        }
    }
    if bytes.starts_with(b"%PDF") {
        return Err(DecodeError::UnsupportedFormat(
            "PDF pages must be rasterized first".into(),
        ));
    }

    let img = image::load_from_memory(bytes)?;
    debug!("decoded {}x{} sheet", img.width(), img.height());
    Ok(img.into_rgb8())
}

pub fn open_sheet(path: &Path) -> Result<RgbImage, DecodeError> {
    let bytes = std::fs::read(path).map_err(|e| DecodeError::Io(path.to_path_buf(), e))?;
    decode_sheet(&bytes, path.extension().and_then(|e| e.to_str()))
}

/// The persisted part of a [`GradingResult`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultBody {
    pub answers: BTreeMap<QuestionNumber, Answer>,
    pub subject_scores: SubjectScores,
    pub total_score: u32,
}

impl From<&GradingResult> for ResultBody {
    fn from(result: &GradingResult) -> Self {
        Self {
            answers: result.answers.clone(),
            subject_scores: result.subject_scores.clone(),
            total_score: result.total_score,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultSummary {
    pub file_name: String,
    pub timestamp: String,
    /// Where the overlay was written, or `None` if writing it failed.
    pub overlay_path: Option<String>,
    pub result: ResultBody,
}

/// Paths written for one graded sheet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub overlay: Option<PathBuf>,
    pub summary: PathBuf,
}

pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// `<stem>_<timestamp>`, the prefix shared by a sheet's artifacts.
pub fn artifact_base(file_name: &str, timestamp: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("sheet");
    format!("{}_{}", stem, timestamp)
}

pub fn overlay_path(out_dir: &Path, base: &str) -> PathBuf {
    out_dir.join(format!("{}_overlay.png", base))
}

pub fn summary_path(out_dir: &Path, base: &str) -> PathBuf {
    out_dir.join(format!("{}_result.json", base))
}

/// Writes the overlay PNG and the JSON summary for a graded sheet.
///
/// The artifacts are named after [`artifact_base`]; if a summary by that name
/// already exists, `_2`, `_3`, ... is appended until a free name is found. A
/// failed overlay write is logged and leaves `overlay_path` empty in the
/// summary; only a failed summary write is an error.
pub fn write_artifacts(
    result: &GradingResult,
    file_name: &str,
    timestamp: &str,
    out_dir: &Path,
) -> Result<(ResultSummary, ArtifactPaths), ReportError> {
    std::fs::create_dir_all(out_dir).map_err(|e| ReportError::Io(out_dir.to_path_buf(), e))?;
    let (base, summary_file, file) =
        claim_summary_file(out_dir, &artifact_base(file_name, timestamp))?;

    let overlay = overlay_path(out_dir, &base);
    let overlay = match result.overlay.save(&overlay) {
        Ok(()) => Some(overlay),
        Err(e) => {
            warn!("unable to write overlay {}: {}", overlay.display(), e);
            None
        }
    };

    let summary = ResultSummary {
        file_name: file_name.to_string(),
        timestamp: timestamp.to_string(),
        overlay_path: overlay.as_ref().map(|p| p.display().to_string()),
        result: ResultBody::from(result),
    };
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &summary)?;
    writer
        .flush()
        .map_err(|e| ReportError::Io(summary_file.clone(), e))?;
    debug!("wrote {}", summary_file.display());

    Ok((
        summary,
        ArtifactPaths {
            overlay,
            summary: summary_file,
        },
    ))
}

/// Creates the summary file for the first free variant of `base`. Creation
/// is exclusive, so two writers never end up with the same name.
fn claim_summary_file(out_dir: &Path, base: &str) -> Result<(String, PathBuf, File), ReportError> {
    let mut candidate = base.to_string();
    let mut n = 1;
    loop {
        let path = summary_path(out_dir, &candidate);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((candidate, path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                n += 1;
                candidate = format!("{}_{}", base, n);
            }
            Err(e) => return Err(ReportError::Io(path, e)),
        }
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    let file = File::create(path).map_err(|e| ReportError::Io(path.to_path_buf(), e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    Ok(())
}
