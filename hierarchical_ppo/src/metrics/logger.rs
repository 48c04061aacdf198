//! Loss loggers for `PPO::update` results.
//!
//! Callers build a [`LossSnapshot`] from each update and pass it to any
//! [`MetricsLogger`]. The library installs no `log` backend itself.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use crate::config::UpdateType;
use crate::learner::UpdateLosses;

/// One update's losses, ready to log.
#[derive(Debug, Clone, PartialEq)]
pub struct LossSnapshot {
    /// Running update counter.
    pub update: u64,
    pub losses: UpdateLosses,
}

impl LossSnapshot {
    pub fn new(update: u64, losses: UpdateLosses) -> Self {
        Self { update, losses }
    }

    pub fn update_type(&self) -> UpdateType {
        self.losses.update_type()
    }

    /// Pre-clip gradient norm, reported by actor-critic updates only.
    pub fn gradient_norm(&self) -> Option<f32> {
        self.losses.as_actor_critic().map(|l| l.max_grad_norm)
    }
}

/// Destination for loss snapshots.
pub trait MetricsLogger: Send {
    fn log(&mut self, snapshot: &LossSnapshot);

    fn flush(&mut self);
}

/// Emits every `log_interval`-th update through `log::info!`.
pub struct ConsoleLogger {
    log_interval: u64,
    last_logged: Option<u64>,
}

impl ConsoleLogger {
    pub fn new(log_interval: u64) -> Self {
        Self {
            log_interval: log_interval.max(1),
            last_logged: None,
        }
    }

    fn due(&self, update: u64) -> bool {
        match self.last_logged {
            None => true,
            Some(last) => update >= last + self.log_interval,
        }
    }
}

impl MetricsLogger for ConsoleLogger {
    fn log(&mut self, snapshot: &LossSnapshot) {
        if !self.due(snapshot.update) {
            return;
        }
        let losses = snapshot
            .losses
            .entries()
            .iter()
            .map(|(name, value)| format!("{}={:.5}", name, value))
            .collect::<Vec<_>>()
            .join(" ");
        log::info!(
            "update {:>6} [{}] {} ({} mini-batches)",
            snapshot.update,
            snapshot.update_type(),
            losses,
            snapshot.losses.num_mini_batches()
        );
        self.last_logged = Some(snapshot.update);
    }

    fn flush(&mut self) {}
}

/// CSV file logger, one row per snapshot. Absent values are left empty.
pub struct CsvLogger {
    writer: BufWriter<File>,
    start_time: Instant,
}

const CSV_HEADER: &str =
    "update,update_type,value,action,dist_entropy,mse,gradients_reward,gradient_norm,num_mini_batches,elapsed_secs";

impl CsvLogger {
    /// Create (or truncate) `path` and write the header row.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "{}", CSV_HEADER)?;
        Ok(Self {
            writer,
            start_time: Instant::now(),
        })
    }
}

fn cell(value: Option<f32>) -> String {
    value.map(|v| format!("{:.6}", v)).unwrap_or_default()
}

impl MetricsLogger for CsvLogger {
    fn log(&mut self, snapshot: &LossSnapshot) {
        let l = &snapshot.losses;
        let elapsed = self.start_time.elapsed().as_secs_f32();
        let result = writeln!(
            self.writer,
            "{},{},{},{},{},{},{},{},{},{:.2}",
            snapshot.update,
            snapshot.update_type(),
            cell(l.get("value")),
            cell(l.get("action")),
            cell(l.get("dist_entropy")),
            cell(l.get("mse")),
            cell(l.get("gradients_reward")),
            cell(snapshot.gradient_norm()),
            l.num_mini_batches(),
            elapsed
        );
        if let Err(e) = result {
            log::warn!("failed to write loss row: {}", e);
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::warn!("failed to flush loss log: {}", e);
        }
    }
}

impl Drop for CsvLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Fans each snapshot out to several loggers.
#[derive(Default)]
pub struct MultiLogger {
    loggers: Vec<Box<dyn MetricsLogger>>,
}

impl MultiLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<L: MetricsLogger + 'static>(mut self, logger: L) -> Self {
        self.loggers.push(Box::new(logger));
        self
    }

    pub fn len(&self) -> usize {
        self.loggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loggers.is_empty()
    }
}

impl MetricsLogger for MultiLogger {
    fn log(&mut self, snapshot: &LossSnapshot) {
        for logger in &mut self.loggers {
            logger.log(snapshot);
        }
    }

    fn flush(&mut self) {
        for logger in &mut self.loggers {
            logger.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learner::{ActorCriticLosses, TransitionModelLosses};
    use std::sync::{Arc, Mutex};

    fn ac_snapshot(update: u64) -> LossSnapshot {
        LossSnapshot::new(
            update,
            UpdateLosses::ActorCritic(ActorCriticLosses {
                value: 0.5,
                action: -0.25,
                dist_entropy: 1.0,
                gradients_reward: None,
                max_grad_norm: 2.0,
                num_mini_batches: 5,
            }),
        )
    }

    fn tm_snapshot(update: u64) -> LossSnapshot {
        LossSnapshot::new(
            update,
            UpdateLosses::TransitionModel(TransitionModelLosses {
                mse: 0.125,
                gradients_reward: Some(0.01),
                num_mini_batches: 3,
                skipped_mini_batches: 0,
            }),
        )
    }

    #[test]
    fn test_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("losses.csv");
        {
            let mut logger = CsvLogger::new(&path).unwrap();
            logger.log(&ac_snapshot(1));
            logger.log(&tm_snapshot(2));
        }
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].starts_with("1,actor_critic,0.500000,-0.250000,1.000000,,,2.000000,5,"));
        assert!(lines[2].starts_with("2,transition_model,,,,0.125000,0.010000,,3,"));
    }

    struct Recorder(Arc<Mutex<Vec<u64>>>);

    impl MetricsLogger for Recorder {
        fn log(&mut self, snapshot: &LossSnapshot) {
            self.0.lock().unwrap().push(snapshot.update);
        }

        fn flush(&mut self) {}
    }

    #[test]
    fn test_multi_logger_fans_out() {
        let a = Arc::new(Mutex::new(Vec::new()));
        let b = Arc::new(Mutex::new(Vec::new()));
        let mut multi = MultiLogger::new()
            .add(Recorder(a.clone()))
            .add(Recorder(b.clone()))
            .add(ConsoleLogger::new(10));
        assert_eq!(multi.len(), 3);
        multi.log(&ac_snapshot(7));
        multi.log(&tm_snapshot(8));
        multi.flush();
        assert_eq!(*a.lock().unwrap(), vec![7, 8]);
        assert_eq!(*b.lock().unwrap(), vec![7, 8]);
    }

    #[test]
    fn test_console_interval() {
        let mut logger = ConsoleLogger::new(3);
        assert!(logger.due(0));
        logger.log(&ac_snapshot(0));
        assert!(!logger.due(2));
        assert!(logger.due(3));
    }
}
