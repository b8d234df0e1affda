//! Terminal progress reporting

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;
use tgbprog_core::session::{JobReport, Phase, ProgramJob, SessionProgress, Stage};

/// Create a byte progress bar labelled with `phase`
pub fn byte_bar(multi: Option<&MultiProgress>, total: u64, phase: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let pb = match multi {
        Some(multi) => multi.add(pb),
        None => pb,
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Session progress shown with indicatif bars
///
/// Erase gets a spinner since the chip gives no progress while busy. Each
/// job gets one bar per stage.
pub struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current_bar: None,
        }
    }

    fn create_spinner(&mut self, message: &'static str) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.current_bar = Some(pb);
    }

    fn finish(&mut self, message: String) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_with_message(message);
        }
    }
}

impl SessionProgress for IndicatifProgress {
    fn phase(&mut self, phase: Phase) {
        self.finish(String::new());
        if phase == Phase::Erase {
            self.create_spinner("Erasing chip...");
        }
    }

    fn job_started(&mut self, _index: usize, job: &ProgramJob, stage: Stage) {
        self.finish(String::new());
        let phase = match stage {
            Stage::Program => format!("Programming {}", job.label),
            Stage::Verify => format!("Verifying {}", job.label),
        };
        self.current_bar = Some(byte_bar(Some(&self.multi), job.len() as u64, &phase));
    }

    fn job_progress(&mut self, _index: usize, _stage: Stage, done: usize) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(done as u64);
        }
    }

    fn job_finished(&mut self, report: &JobReport) {
        self.finish(report.outcome.to_string());
    }
}

impl Default for IndicatifProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.abandon();
        }
    }
}
