use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Snapshot of one outer adaptivity iteration, emitted after its estimation sweep
#[derive(Debug, Clone)]
pub struct AdaptStepRecord {
    /// Outer iteration number, starting at 1
    pub step: usize,
    /// DOF count of the mesh the step solved on
    pub num_dofs: usize,
    /// Largest per-element FTR error indicator
    pub max_ftr_error: f64,
    /// Relative error against the exact-solution oracle, when one was supplied.
    /// Diagnostic only; never part of the stopping decision.
    pub exact_rel_error: Option<f64>,
}

/// Consumes mesh/solution checkpoints produced by the drivers
///
/// Implementations own all presentation logic; the core only decides *when* to emit:
/// once per outer iteration and once at the end of a run.
pub trait Reporter {
    fn on_step(&mut self, record: &AdaptStepRecord);
    fn on_finish(&mut self) {}
}

/// A Reporter that discards everything
pub struct NullReporter;

impl Reporter for NullReporter {
    fn on_step(&mut self, _record: &AdaptStepRecord) {}
}

/// Writes the DOF-vs-error convergence history to a CSV file when the run finishes
pub struct CsvReporter {
    path: PathBuf,
    rows: Vec<AdaptStepRecord>,
}

impl CsvReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rows: Vec::new(),
        }
    }
}

impl Reporter for CsvReporter {
    fn on_step(&mut self, record: &AdaptStepRecord) {
        self.rows.push(record.clone());
    }

    fn on_finish(&mut self) {
        if self.rows.is_empty() {
            return;
        }

        match File::create(&self.path) {
            Ok(file) => {
                let mut writer = BufWriter::new(file);
                let _ = writeln!(writer, "step,num_dofs,max_ftr_error,exact_rel_error");
                for row in self.rows.drain(0..) {
                    let exact = row
                        .exact_rel_error
                        .map(|e| format!("{e}"))
                        .unwrap_or_default();
                    let _ = writeln!(
                        writer,
                        "{},{},{},{}",
                        row.step, row.num_dofs, row.max_ftr_error, exact
                    );
                }
            }
            Err(err) => {
                log::warn!(
                    "Could not create convergence history file {}: {}",
                    self.path.display(),
                    err
                );
            }
        }
    }
}
