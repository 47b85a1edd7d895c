// src/progress.rs
//
// Console progress for upload runs: one line per fetched file, a banner per
// batch, and a status dump when the service rejects a batch.
//
// All times are measured from the single run-start instant handed in at
// construction. Output is best effort: a write failure (e.g. a closed pipe)
// is logged once and further output is dropped.

use std::fmt;
use std::io::Write;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::upload::UploadResult;

const RULE: &str = "********************";

/// `"{:5.2}s"`, e.g. `" 1.50s"`.
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:5.2}s", elapsed.as_secs_f64())
}

pub struct ProgressReporter<W: Write> {
    out: W,
    started: Instant,
    broken: bool,
}

impl<W: Write> ProgressReporter<W> {
    pub fn new(out: W, started: Instant) -> Self {
        Self { out, started, broken: false }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if self.broken {
            return;
        }
        if let Err(e) = writeln!(self.out, "{}", args) {
            warn!("progress output failed, suppressing further output: {}", e);
            self.broken = true;
        }
    }

    pub fn batch_banner(&mut self, number: usize) {
        self.line(format_args!("*****Batch {}*****", number));
    }

    pub fn file_header(&mut self) {
        self.line(format_args!("{:<30} {:>20}", "File", "Completed at"));
    }

    pub fn file_done(&mut self, name: &str) {
        let at = format_elapsed(self.elapsed());
        self.line(format_args!("{:<30} {:>20}", name, at));
    }

    pub fn fetch_failures(&mut self, number: usize, failed: usize, total: usize) {
        self.line(format_args!(
            "{} of {} blobs in batch {} failed to fetch and were excluded.",
            failed, total, number
        ));
    }

    pub fn uploading(&mut self, number: usize) {
        self.line(format_args!("{}", RULE));
        self.line(format_args!("Uploading Batch {}.", number));
    }

    pub fn batch_skipped(&mut self, number: usize) {
        self.line(format_args!("Batch {} has no images left to upload, skipping.", number));
        self.line(format_args!("{}", RULE));
    }

    pub fn batch_succeeded(&mut self, number: usize) {
        let at = format_elapsed(self.elapsed());
        self.line(format_args!("Image batch {} uploaded successfully.", number));
        self.line(format_args!("Batch {} completed at {}", number, at));
        self.line(format_args!("{}", RULE));
    }

    pub fn batch_failed(&mut self, result: &UploadResult) {
        self.line(format_args!("Image batch upload failed."));
        for (name, status) in &result.per_image_status {
            self.line(format_args!("Image status: {} {}", status, name));
        }
        self.line(format_args!("{}", RULE));
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
