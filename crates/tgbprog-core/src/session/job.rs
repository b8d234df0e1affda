//! Program jobs and their validation

use alloc::string::String;
use alloc::vec::Vec;

use crate::chip::PAGE_SIZE;
use crate::error::{Error, JobFault, Result};
use crate::spi::AddressWidth;

/// One image to be written at a fixed offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramJob {
    /// Name shown in logs and reports, usually the file name
    pub label: String,
    /// Flash address of the first byte
    pub offset: u32,
    /// Bytes to program
    pub data: Vec<u8>,
}

impl ProgramJob {
    /// Create a job
    pub fn new(label: impl Into<String>, offset: u32, data: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            offset,
            data,
        }
    }

    /// First address past the job
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.data.len() as u64
    }

    /// Number of bytes to program
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the job carries no data
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn overlaps(&self, other: &ProgramJob) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        (self.offset as u64) < other.end() && (other.offset as u64) < self.end()
    }
}

/// Check a job list before any command reaches the device
///
/// Every job must end within `capacity` (and the 24-bit address space) and
/// not overlap another job. A job may start mid-page only if it ends within
/// that page. The first offending job is reported.
pub fn validate_jobs(jobs: &[ProgramJob], capacity: u32) -> Result<()> {
    let capacity = capacity.min(AddressWidth::ThreeByte.max_size());

    for (index, job) in jobs.iter().enumerate() {
        let column = job.offset as usize % PAGE_SIZE;
        if column != 0 && column + job.len() > PAGE_SIZE {
            return Err(Error::InvalidJob {
                index,
                reason: JobFault::CrossesPage {
                    offset: job.offset,
                    len: job.len(),
                },
            });
        }

        if job.end() > capacity as u64 {
            return Err(Error::InvalidJob {
                index,
                reason: JobFault::BeyondCapacity {
                    end: job.end(),
                    capacity,
                },
            });
        }

        if let Some(other) = jobs[..index].iter().position(|prev| prev.overlaps(job)) {
            return Err(Error::InvalidJob {
                index,
                reason: JobFault::Overlaps { other },
            });
        }
    }

    Ok(())
}
