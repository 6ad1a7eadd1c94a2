use core::fmt::Display;
use core::sync::atomic::{AtomicU64, Ordering};

use tracing::{error, info};

/// Numbered progress lines for one run. Tasks interleave, every line still
/// gets its own step number.
#[derive(Default)]
pub struct Progress {
    step: AtomicU64,
}

impl Progress {
    pub fn next_step(&self) -> u64 {
        self.step.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn steps(&self) -> u64 {
        self.step.load(Ordering::Relaxed)
    }

    pub fn created(&self, attendee: &str, what: impl Display) {
        let step = self.next_step();
        info!(step, attendee, outcome = "created", "[{step}] created {what} for {attendee}");
    }

    pub fn skipped(&self, attendee: &str, what: impl Display) {
        let step = self.next_step();
        info!(
            step,
            attendee,
            outcome = "skipped",
            "[{step}] skipping {what} for {attendee} (already exists)"
        );
    }

    pub fn import_started(&self, attendee: &str, what: impl Display, operation: &str) {
        let step = self.next_step();
        info!(
            step,
            attendee,
            operation,
            outcome = "started",
            "[{step}] started import into {what} for {attendee}"
        );
    }

    pub fn deleted(&self, attendee: &str, what: impl Display) {
        let step = self.next_step();
        info!(step, attendee, outcome = "deleted", "[{step}] deleted {what} for {attendee}");
    }

    pub fn failed(&self, action: &str, attendee: &str, what: impl Display, error: impl Display) {
        let step = self.next_step();
        error!(
            step,
            attendee,
            outcome = "failed",
            "[{step}] error {action} {what} for attendee {attendee}: {error}"
        );
    }
}
