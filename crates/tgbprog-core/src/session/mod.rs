//! Programming sessions
//!
//! A session takes an ordered list of images and writes them to the flash
//! while the board is held in reset:
//!
//! 1. validate the job list (nothing is sent if it is invalid)
//! 2. drive the reset line low
//! 3. check the JEDEC ID, then soft reset the flash
//! 4. optionally erase the whole chip
//! 5. program each image, optionally reading it back
//! 6. release the reset line
//!
//! A verification mismatch is recorded against its job and the session
//! carries on with the next one. Any other error stops the session; the
//! remaining jobs are reported as not attempted. The reset line is
//! released on every path.

mod guard;
mod job;
mod report;

pub use guard::ResetHold;
pub use job::{validate_jobs, ProgramJob};
pub use report::{JobOutcome, JobReport, SessionReport};

use crate::chip::{JedecId, W25Q80DV};
use crate::error::{Error, Result};
use crate::flash::{FlashConfig, SpiFlash};
use crate::programmer::{Programmer, SpiMaster};

/// Reset line used when none is configured (ADBUS4 / GPIOL0 on FTDI)
pub const DEFAULT_RESET_LINE: u8 = 4;

/// Session parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Erase the whole chip before programming
    pub erase: bool,
    /// Read every image back after programming it
    pub verify: bool,
    /// Identity the device must report
    pub expected_id: JedecId,
    /// Output line holding the board in reset
    pub reset_line: u8,
    /// Device size in bytes, used to validate jobs
    pub capacity: u32,
    /// Polling and chunking
    pub flash: FlashConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            erase: false,
            verify: false,
            expected_id: W25Q80DV.id,
            reset_line: DEFAULT_RESET_LINE,
            capacity: W25Q80DV.total_size,
            flash: FlashConfig::default(),
        }
    }
}

/// Session-wide steps, reported before each starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Checking the JEDEC ID
    Identify,
    /// Soft reset of the flash
    Reset,
    /// Chip erase
    Erase,
    /// Releasing the reset line
    Release,
}

/// Per-job steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Writing the image
    Program,
    /// Reading the image back
    Verify,
}

/// Observer for session progress
///
/// Every method has an empty default so implementors only pick what they
/// display.
pub trait SessionProgress {
    /// A session-wide step is about to start
    fn phase(&mut self, _phase: Phase) {}

    /// A job enters `stage`
    fn job_started(&mut self, _index: usize, _job: &ProgramJob, _stage: Stage) {}

    /// `done` bytes of the current stage are complete
    fn job_progress(&mut self, _index: usize, _stage: Stage, _done: usize) {}

    /// A job reached its final outcome
    fn job_finished(&mut self, _report: &JobReport) {}
}

/// Progress observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl SessionProgress for NoProgress {}

/// Run a complete programming session
///
/// Never returns early with an error; everything that went wrong is in the
/// report.
pub fn run_session<M, P>(
    master: &mut M,
    config: &SessionConfig,
    jobs: &[ProgramJob],
    progress: &mut P,
) -> SessionReport
where
    M: Programmer + ?Sized,
    P: SessionProgress + ?Sized,
{
    let mut report = SessionReport::new(jobs);

    if let Err(e) = validate_jobs(jobs, config.capacity) {
        log::error!("{}", e);
        report.fatal = Some(e);
        return report;
    }

    let mut hold = match ResetHold::assert(master, config.reset_line) {
        Ok(hold) => hold,
        Err(e) => {
            log::error!("Failed to assert reset line: {}", e);
            report.fatal = Some(e);
            return report;
        }
    };

    if let Err(e) = run_held(&mut *hold, config, jobs, progress, &mut report) {
        log::error!("{}", e);
        report.fatal = Some(e);
    }

    progress.phase(Phase::Release);
    if let Err(e) = hold.release() {
        log::error!("Failed to release reset line: {}", e);
        report.fatal.get_or_insert(e);
    }

    if report.is_success() {
        log::info!("Program completed successfully");
    } else {
        log::error!("Program completed with some error");
    }
    report
}

fn run_held<M, P>(
    master: &mut M,
    config: &SessionConfig,
    jobs: &[ProgramJob],
    progress: &mut P,
    report: &mut SessionReport,
) -> Result<()>
where
    M: SpiMaster + ?Sized,
    P: SessionProgress + ?Sized,
{
    let mut flash = SpiFlash::new(master, config.flash);

    log::info!("Check JEDEC ID...");
    progress.phase(Phase::Identify);
    match flash.check_id(config.expected_id) {
        Ok(id) => report.id = Some(id),
        Err(e) => {
            if let Error::IdentityMismatch { found, .. } = e {
                report.id = Some(found);
            }
            return Err(e);
        }
    }

    log::info!("Reset device...");
    progress.phase(Phase::Reset);
    flash.soft_reset()?;

    if config.erase {
        log::info!("Erase device...");
        progress.phase(Phase::Erase);
        flash.chip_erase()?;
    }

    for (index, job) in jobs.iter().enumerate() {
        let outcome = program_job(&mut flash, config.verify, index, job, progress);
        let entry = &mut report.jobs[index];
        entry.outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => JobOutcome::Failed(e),
        };
        progress.job_finished(entry);

        if let JobOutcome::Failed(e) = entry.outcome {
            if e.is_fatal() {
                return Err(e);
            }
        }
    }

    Ok(())
}

fn program_job<M, P>(
    flash: &mut SpiFlash<'_, M>,
    verify: bool,
    index: usize,
    job: &ProgramJob,
    progress: &mut P,
) -> Result<JobOutcome>
where
    M: SpiMaster + ?Sized,
    P: SessionProgress + ?Sized,
{
    let last = job.end().saturating_sub(1).max(job.offset as u64);

    log::info!("Program: 0x{:06X} - 0x{:06X} ... {}", job.offset, last, job.label);
    progress.job_started(index, job, Stage::Program);
    flash.page_program_with(job.offset, &job.data, |done| {
        progress.job_progress(index, Stage::Program, done)
    })?;

    if !verify {
        return Ok(JobOutcome::Programmed);
    }

    log::info!("Verify : 0x{:06X} - 0x{:06X} ... {}", job.offset, last, job.label);
    progress.job_started(index, job, Stage::Verify);
    let back = flash.read_data_with(job.offset, job.len(), |done| {
        progress.job_progress(index, Stage::Verify, done)
    })?;

    match compare(job.offset, &job.data, &back) {
        None => Ok(JobOutcome::Verified),
        Some(e) => {
            log::error!("Failed verification! {}", e);
            Ok(JobOutcome::Failed(e))
        }
    }
}

/// Compare programmed data with the read-back
fn compare(offset: u32, expected: &[u8], found: &[u8]) -> Option<Error> {
    let mut diffs = expected
        .iter()
        .zip(found)
        .enumerate()
        .filter(|(_, (a, b))| a != b);

    let (first, (&want, &got)) = diffs.next()?;
    Some(Error::VerificationMismatch {
        addr: offset + first as u32,
        expected: want,
        found: got,
        mismatched: 1 + diffs.count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::programmer::LineLevel;
    use crate::spi::opcodes;
    use crate::testing::{Event, ScriptedMaster};
    use alloc::vec;
    use alloc::vec::Vec;

    const W25Q80: [u8; 3] = [0xEF, 0x40, 0x14];

    #[derive(Default)]
    struct Recorder {
        phases: Vec<Phase>,
        finished: Vec<(usize, JobOutcome)>,
    }

    impl SessionProgress for Recorder {
        fn phase(&mut self, phase: Phase) {
            self.phases.push(phase);
        }

        fn job_finished(&mut self, report: &JobReport) {
            self.finished.push((report.index, report.outcome));
        }
    }

    #[test]
    fn test_compare_counts_all_differences() {
        let e = compare(0x100, &[1, 2, 3, 4], &[1, 0, 3, 0]).unwrap();
        assert_eq!(
            e,
            Error::VerificationMismatch {
                addr: 0x101,
                expected: 2,
                found: 0,
                mismatched: 2
            }
        );
        assert_eq!(compare(0, &[1, 2], &[1, 2]), None);
    }

    #[test]
    fn test_session_without_verify() {
        let mut master = ScriptedMaster::new().with_id(W25Q80);
        let jobs = [ProgramJob::new("a.bin", 0x1000, vec![0xAA; 10])];
        let mut rec = Recorder::default();
        let report = run_session(&mut master, &SessionConfig::default(), &jobs, &mut rec);

        assert!(report.is_success());
        assert_eq!(report.id, Some(JedecId::from_bytes(W25Q80)));
        assert_eq!(rec.phases, [Phase::Identify, Phase::Reset, Phase::Release]);
        assert_eq!(rec.finished, [(0, JobOutcome::Programmed)]);
        assert_eq!(
            master.opcodes(),
            [
                opcodes::RDID,
                opcodes::RSTEN,
                opcodes::RST,
                opcodes::WREN,
                opcodes::PP,
                opcodes::WRDI
            ]
        );
    }

    #[test]
    fn test_identity_mismatch_releases_line() {
        let mut master = ScriptedMaster::new().with_id([0xC2, 0x20, 0x16]);
        let jobs = [ProgramJob::new("a.bin", 0, vec![1])];
        let report = run_session(&mut master, &SessionConfig::default(), &jobs, &mut NoProgress);

        assert!(!report.is_success());
        assert!(matches!(report.fatal, Some(Error::IdentityMismatch { .. })));
        assert_eq!(report.id, Some(JedecId::new(0xC2, 0x20, 0x16)));
        assert_eq!(report.jobs[0].outcome, JobOutcome::NotAttempted);
        assert_eq!(
            master.events(),
            &[
                Event::Line(4, LineLevel::Low),
                Event::Spi(opcodes::RDID),
                Event::Line(4, LineLevel::Released)
            ]
        );
    }

    #[test]
    fn test_invalid_jobs_send_nothing() {
        let mut master = ScriptedMaster::new().with_id(W25Q80);
        let jobs = [ProgramJob::new("a.bin", 0xF0, vec![1; 0x20])];
        let report = run_session(&mut master, &SessionConfig::default(), &jobs, &mut NoProgress);

        assert!(matches!(report.fatal, Some(Error::InvalidJob { index: 0, .. })));
        assert!(master.events().is_empty());
    }

    #[test]
    fn test_fatal_error_skips_remaining_jobs() {
        let mut master = ScriptedMaster::new().with_id(W25Q80).fail_on(opcodes::PP);
        let jobs = [
            ProgramJob::new("a.bin", 0x0000, vec![1]),
            ProgramJob::new("b.bin", 0x1000, vec![2]),
        ];
        let report = run_session(&mut master, &SessionConfig::default(), &jobs, &mut NoProgress);

        assert_eq!(
            report.fatal,
            Some(Error::Transport(crate::TransportError::TransferFailed))
        );
        assert!(matches!(report.jobs[0].outcome, JobOutcome::Failed(_)));
        assert_eq!(report.jobs[1].outcome, JobOutcome::NotAttempted);
        assert_eq!(
            master.events().last(),
            Some(&Event::Line(4, LineLevel::Released))
        );
    }

    #[test]
    fn test_erase_phase_when_requested() {
        let mut master = ScriptedMaster::new().with_id(W25Q80);
        let config = SessionConfig {
            erase: true,
            ..Default::default()
        };
        let mut rec = Recorder::default();
        let report = run_session(&mut master, &config, &[], &mut rec);

        assert!(report.is_success());
        assert_eq!(
            rec.phases,
            [Phase::Identify, Phase::Reset, Phase::Erase, Phase::Release]
        );
        assert!(master.opcodes().contains(&opcodes::CE_60));
    }
}
