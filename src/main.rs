extern crate log;
extern crate pretty_env_logger;

use std::path::{Path, PathBuf};
use std::process::exit;

use clap::{arg, command, value_parser, Command};
use log::error;
use rayon::prelude::*;

use omr_grader::{
    grade, load_answer_key,
    report::{format_timestamp, open_sheet, write_artifacts, write_json, ResultSummary},
    AnswerKey, DemoKeySource, GradeOptions,
};

fn main() {
    pretty_env_logger::init_custom_env("LOG");

    let matches = cli().get_matches();
    let sheet_paths = matches
        .get_many::<PathBuf>("sheets")
        .expect("at least one sheet is required")
        .cloned()
        .collect::<Vec<_>>();
    let out_dir = matches
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("results"));

    let mut options = match matches.get_one::<PathBuf>("config") {
        Some(path) => match load_options(path) {
            Ok(options) => options,
            Err(e) => {
                eprintln!("Error reading config {}: {}", path.display(), e);
                exit(1);
            }
        },
        None => GradeOptions::default(),
    };
    if let Some(threshold) = matches.get_one::<f64>("threshold") {
        options.threshold = *threshold;
    }
    if let Err(e) = options.validate() {
        eprintln!("Error: {}", e);
        exit(1);
    }

    let key = load_answer_key(
        matches.get_one::<PathBuf>("key").map(PathBuf::as_path),
        &DemoKeySource::default(),
        options.questions,
    );

    let summaries = sheet_paths
        .par_iter()
        .filter_map(|path| grade_sheet(path, &key, &options, &out_dir))
        .collect::<Vec<_>>();

    for summary in &summaries {
        println!(
            "{}: {} ({})",
            summary.file_name,
            summary.result.total_score,
            summary
                .result
                .subject_scores
                .iter()
                .map(|(subject, correct)| format!("{}={}", subject, correct))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    if let Err(e) = std::fs::create_dir_all(&out_dir) {
        eprintln!("Error creating {}: {}", out_dir.display(), e);
        exit(1);
    }
    if let Err(e) = write_json(&out_dir.join("results.json"), &summaries) {
        eprintln!("Error writing combined results: {}", e);
        exit(1);
    }

    if summaries.len() < sheet_paths.len() {
        exit(1);
    }
}

fn load_options(path: &Path) -> Result<GradeOptions, Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Grades one sheet and writes its artifacts. Failures are logged so the
/// rest of the batch carries on.
fn grade_sheet(
    path: &Path,
    key: &AnswerKey,
    options: &GradeOptions,
    out_dir: &Path,
) -> Option<ResultSummary> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let img = match open_sheet(path) {
        Ok(img) => img,
        Err(e) => {
            error!("failed to read {}: {}", path.display(), e);
            return None;
        }
    };

    let result = match grade(&img, key, options) {
        Ok(result) => result,
        Err(e) => {
            error!("grading failed for {}: {}", path.display(), e);
            return None;
        }
    };

    let timestamp = format_timestamp(&chrono::Utc::now());
    match write_artifacts(&result, &file_name, &timestamp, out_dir) {
        Ok((summary, _)) => Some(summary),
        Err(e) => {
            error!("failed to save results for {}: {}", path.display(), e);
            None
        }
    }
}

#[allow(clippy::cognitive_complexity)]
fn cli() -> Command {
    command!()
        .arg(
            arg!(-k --key <PATH> "Path to answer_key.json; a demo key is used if absent")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(-c --config <PATH> "Path to grading options JSON")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(-t --threshold <FILL> "Fill fraction a mark must exceed")
                .value_parser(value_parser!(f64)),
        )
        .arg(
            arg!(-o --output <DIR> "Directory for overlays and results")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(sheets: <SHEET>... "Sheet images to grade")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
}
