//! Daily pipeline runner.
//!
//! A pipeline is an ordered list of fallible stages behind a global advisory
//! lock. Only one pipeline runs at a time across all hosts sharing the lock;
//! losing the lock race is a no-op, not an error. A failing stage is logged
//! and tallied, later stages still run.

use log::{error, info};

use crate::domain::error::ScreenerError;

/// Global mutual exclusion for the pipeline. The Postgres adapter backs this
/// with `pg_try_advisory_lock`.
pub trait AdvisoryLock {
    /// `false` means another run holds the lock.
    fn try_acquire(&self) -> Result<bool, ScreenerError>;
    fn release(&self) -> Result<(), ScreenerError>;
}

pub struct Stage<'a> {
    pub name: String,
    pub run: Box<dyn FnMut() -> Result<(), ScreenerError> + 'a>,
}

impl<'a> Stage<'a> {
    pub fn new(name: impl Into<String>, run: impl FnMut() -> Result<(), ScreenerError> + 'a) -> Self {
        Self {
            name: name.into(),
            run: Box::new(run),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    /// False when the advisory lock was held elsewhere and nothing ran.
    pub ran: bool,
    pub succeeded: usize,
    pub failed: usize,
}

pub fn run(lock: &dyn AdvisoryLock, mut stages: Vec<Stage<'_>>) -> Result<PipelineReport, ScreenerError> {
    if !lock.try_acquire()? {
        info!("pipeline lock held by another run, nothing to do");
        return Ok(PipelineReport {
            ran: false,
            succeeded: 0,
            failed: 0,
        });
    }
    let mut succeeded = 0;
    let mut failed = 0;
    for stage in &mut stages {
        info!("pipeline stage {} starting", stage.name);
        match (stage.run)() {
            Ok(()) => {
                succeeded += 1;
                info!("pipeline stage {} done", stage.name);
            }
            Err(e) => {
                failed += 1;
                error!("pipeline stage {} failed: {e}", stage.name);
            }
        }
    }
    lock.release()?;
    info!("pipeline finished: {succeeded} ok, {failed} failed");
    Ok(PipelineReport {
        ran: true,
        succeeded,
        failed,
    })
}
