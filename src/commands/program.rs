//! Program command implementation

use super::progress::IndicatifProgress;
use crate::cli::FlashArgs;
use crate::manifest::{ImageSpec, Manifest};
use crate::programmers::open_programmer;
use std::path::PathBuf;
use tgbprog_core::chip::{JedecId, W25Q80DV};
use tgbprog_core::session::{run_session, ProgramJob, SessionConfig, SessionProgress};

/// Arguments of the `program` command
#[derive(Debug, Clone)]
pub struct ProgramArgs {
    pub files: Vec<PathBuf>,
    pub offsets: Vec<u32>,
    pub erase: bool,
    pub verify: bool,
    pub manifest: Option<PathBuf>,
    pub capacity: Option<u32>,
    pub flash: FlashArgs,
}

/// What a session will do, after merging the manifest with the flags
#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionPlan {
    erase: bool,
    verify: bool,
    expected_id: JedecId,
    images: Vec<ImageSpec>,
}

/// Merge command line arguments with an optional manifest
///
/// Flags are OR'ed with the manifest's, a command line ID wins over the
/// manifest's and command line images come after the manifest's.
fn plan_session(
    args: &ProgramArgs,
    manifest: Option<Manifest>,
) -> Result<SessionPlan, Box<dyn std::error::Error>> {
    if args.files.len() != args.offsets.len() {
        return Err(format!(
            "The number of files ({}) does not match the number of offsets ({})",
            args.files.len(),
            args.offsets.len()
        )
        .into());
    }

    let manifest = manifest.unwrap_or_default();
    let mut images = manifest.images;
    images.extend(
        args.files
            .iter()
            .zip(&args.offsets)
            .map(|(file, &offset)| ImageSpec {
                file: file.clone(),
                offset,
            }),
    );

    if images.is_empty() {
        return Err("No images to program (use --file/--offset or --manifest)".into());
    }

    Ok(SessionPlan {
        erase: args.erase || manifest.erase,
        verify: args.verify || manifest.verify,
        expected_id: args
            .flash
            .expected_id
            .or(manifest.expected_id)
            .unwrap_or(W25Q80DV.id),
        images,
    })
}

/// Read every image into a program job
fn load_jobs(images: &[ImageSpec]) -> Result<Vec<ProgramJob>, Box<dyn std::error::Error>> {
    images
        .iter()
        .map(|image| {
            let data = std::fs::read(&image.file)
                .map_err(|e| format!("Failed to read {}: {}", image.file.display(), e))?;
            log::debug!(
                "Loaded {} ({} bytes) for 0x{:06X}",
                image.file.display(),
                data.len(),
                image.offset
            );
            Ok(ProgramJob::new(
                image.file.display().to_string(),
                image.offset,
                data,
            ))
        })
        .collect()
}

/// Run the program command
pub fn run_program(programmer: &str, args: &ProgramArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut progress = IndicatifProgress::new();
    run_program_with(programmer, args, &mut progress)
}

fn run_program_with(
    programmer: &str,
    args: &ProgramArgs,
    progress: &mut dyn SessionProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let manifest = match &args.manifest {
        Some(path) => {
            let manifest = Manifest::load(path)?;
            log::info!(
                "Loaded manifest {} ({} images)",
                path.display(),
                manifest.images.len()
            );
            Some(manifest)
        }
        None => None,
    };

    // Everything that can be checked on the host is checked before the
    // programmer is opened
    let plan = plan_session(args, manifest)?;
    let jobs = load_jobs(&plan.images)?;

    let mut handle = open_programmer(programmer)?;
    let config = SessionConfig {
        erase: plan.erase,
        verify: plan.verify,
        expected_id: plan.expected_id,
        reset_line: handle.reset_line,
        capacity: args.capacity.unwrap_or(W25Q80DV.total_size),
        flash: args.flash.flash_config(),
    };

    let report = run_session(handle.programmer(), &config, &jobs, progress);

    println!();
    for job in &report.jobs {
        println!("{}", job);
    }

    if report.is_success() {
        return Ok(());
    }

    match report.fatal {
        Some(e) => Err(e.into()),
        None => Err(format!(
            "{} of {} images failed",
            report.failures().count(),
            report.jobs.len()
        )
        .into()),
    }
}
