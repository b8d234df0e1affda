//! Session results

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::chip::JedecId;
use crate::error::Error;

use super::ProgramJob;

/// What happened to one job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Written, read-back not requested
    Programmed,
    /// Written and read back identical
    Verified,
    /// Programming failed or the read-back differed
    Failed(Error),
    /// The session stopped before reaching this job
    NotAttempted,
}

impl JobOutcome {
    /// Returns true for `Programmed` and `Verified`
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Programmed | Self::Verified)
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Programmed => write!(f, "programmed"),
            Self::Verified => write!(f, "verified"),
            Self::Failed(e) => write!(f, "{}", e),
            Self::NotAttempted => write!(f, "not attempted"),
        }
    }
}

/// Result of one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// Position in the job list
    pub index: usize,
    /// Job label
    pub label: String,
    /// First address
    pub offset: u32,
    /// Length in bytes
    pub len: usize,
    /// Outcome
    pub outcome: JobOutcome,
}

impl JobReport {
    pub(crate) fn pending(index: usize, job: &ProgramJob) -> Self {
        Self {
            index,
            label: job.label.clone(),
            offset: job.offset,
            len: job.len(),
            outcome: JobOutcome::NotAttempted,
        }
    }

    /// Last address covered by the job (inclusive)
    pub fn last_addr(&self) -> u32 {
        (self.offset as u64 + self.len as u64).saturating_sub(1).max(self.offset as u64) as u32
    }
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:06X} - 0x{:06X} {}: {}",
            self.offset,
            self.last_addr(),
            self.label,
            self.outcome
        )
    }
}

/// Aggregate result of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Identity read from the device, if READ_ID got that far
    pub id: Option<JedecId>,
    /// One entry per job, in order
    pub jobs: Vec<JobReport>,
    /// Error that stopped the session early
    pub fatal: Option<Error>,
}

impl SessionReport {
    pub(crate) fn new(jobs: &[ProgramJob]) -> Self {
        Self {
            id: None,
            jobs: jobs
                .iter()
                .enumerate()
                .map(|(i, job)| JobReport::pending(i, job))
                .collect(),
            fatal: None,
        }
    }

    /// True if no fatal error occurred and every job succeeded
    pub fn is_success(&self) -> bool {
        self.fatal.is_none() && self.jobs.iter().all(|j| j.outcome.is_success())
    }

    /// Jobs that did not succeed, including those never attempted
    pub fn failures(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|j| !j.outcome.is_success())
    }
}
