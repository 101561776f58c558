//! Progress reporting hooks for long-running searches.

use prospector_shared::CompanyOutcome;

/// Progress callback for reporting search status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each company reaches its outcome.
    fn company_done(&self, outcome: &CompanyOutcome, done: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn company_done(&self, _outcome: &CompanyOutcome, _done: usize, _total: usize) {}
}
