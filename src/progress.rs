use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Minimum advance, in percentage points, between two reports during stepping.
const REPORT_INTERVAL_PERCENT: i64 = 5;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgressRecord {
    pub phase: String,
    pub current_step: usize,
    pub total_steps: usize,
    /// Rounded to one decimal place
    pub percent: f64,
    pub message: String,
}

impl ProgressRecord {
    pub fn new(
        phase: impl ToString,
        current_step: usize,
        total_steps: usize,
        message: impl Into<String>,
    ) -> Self {
        let percent = if total_steps > 0 {
            (current_step as f64 / total_steps as f64 * 1000.).round() / 10.
        } else {
            0.
        };

        Self {
            phase: phase.to_string(),
            current_step,
            total_steps,
            percent,
            message: message.into(),
        }
    }
}

/// Receives progress records. Reporting never affects the simulation, so sinks swallow
/// their own failures.
pub trait ProgressSink {
    fn report(&mut self, record: &ProgressRecord);
}

impl<P: ProgressSink + ?Sized> ProgressSink for Box<P> {
    fn report(&mut self, record: &ProgressRecord) {
        (**self).report(record)
    }
}

/// Keeps a JSON file with the latest record, replaced atomically on every report.
#[derive(Debug)]
pub struct JsonProgressFile {
    path: PathBuf,
}

impl JsonProgressFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn write(&self, record: &ProgressRecord) -> anyhow::Result<()> {
        let temporary = self.path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&temporary)?);
            serde_json::to_writer(&mut writer, record)?;
            writer.flush()?;
        }
        fs::rename(&temporary, &self.path)?;

        Ok(())
    }
}

impl ProgressSink for JsonProgressFile {
    fn report(&mut self, record: &ProgressRecord) {
        if let Err(error) = self.write(record) {
            warn!("Could not update {}: {error}", self.path.display());
        }
    }
}

#[derive(Debug, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&mut self, record: &ProgressRecord) {
        debug!(
            phase = %record.phase,
            step = record.current_step,
            total = record.total_steps,
            "{:.1}% {}",
            record.percent,
            record.message
        );
    }
}

/// Decides which steps of a run are reported: the first, the last, and any step at
/// least [`REPORT_INTERVAL_PERCENT`] points past the previous report.
#[derive(Clone, Debug)]
pub struct ProgressThrottle {
    total_steps: usize,
    last_percent: i64,
}

impl ProgressThrottle {
    pub fn new(total_steps: usize) -> Self {
        Self {
            total_steps,
            last_percent: -REPORT_INTERVAL_PERCENT,
        }
    }

    pub fn is_due(&mut self, step: usize) -> bool {
        if self.total_steps == 0 {
            return false;
        }
        let percent = (step * 100 / self.total_steps) as i64;
        if step == 1
            || percent >= self.last_percent + REPORT_INTERVAL_PERCENT
            || step == self.total_steps
        {
            self.last_percent = percent;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    #[case(0, 730, 0.)]
    #[case(1, 730, 0.1)]
    #[case(365, 730, 50.)]
    #[case(730, 730, 100.)]
    #[case(0, 0, 0.)]
    fn should_round_percent_to_one_decimal(
        #[case] step: usize,
        #[case] total: usize,
        #[case] expected: f64,
    ) {
        assert_eq!(ProgressRecord::new("stepping", step, total, "").percent, expected);
    }

    #[rstest]
    fn should_report_first_last_and_every_five_percent() {
        let mut throttle = ProgressThrottle::new(200);

        let reported: Vec<usize> = (1..=200).filter(|step| throttle.is_due(*step)).collect();

        assert_eq!(reported.first(), Some(&1));
        assert_eq!(reported.last(), Some(&200));
        assert_eq!(&reported[..4], &[1, 10, 20, 30]);
        assert_eq!(reported.len(), 21);
    }

    #[rstest]
    fn should_report_every_step_of_short_runs() {
        let mut throttle = ProgressThrottle::new(3);

        assert!((1..=3).all(|step| throttle.is_due(step)));
    }

    #[rstest]
    fn should_replace_progress_file() {
        let directory = std::env::temp_dir().join(format!("subterra-progress-{}", std::process::id()));
        fs::create_dir_all(&directory).unwrap();
        let path = directory.join("progress.json");
        let mut sink = JsonProgressFile::new(path.clone());

        sink.report(&ProgressRecord::new("stepping", 1, 4, "first"));
        sink.report(&ProgressRecord::new("stepping", 4, 4, "last"));

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["current_step"], 4);
        assert_eq!(written["percent"], 100.0);
        assert_eq!(written["message"], "last");
        assert!(!path.with_extension("json.tmp").exists());

        fs::remove_dir_all(&directory).unwrap();
    }

    #[rstest]
    fn should_ignore_unwritable_progress_file() {
        let mut sink = JsonProgressFile::new(PathBuf::from("/nonexistent/dir/progress.json"));

        sink.report(&ProgressRecord::new("stepping", 1, 1, ""));
    }
}
