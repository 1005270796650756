//! Command-line logger
use super::{Event, LogError, Loggable, Logger};
use enum_map::EnumMap;
use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::time::{Duration, Instant};
use yansi::Paint;

/// Logger that aggregates statistics and periodically prints a summary to stdout.
///
/// A summary covers every event occurrence since the previous summary. Pending values of an
/// unfinished occurrence are only counted once [`Logger::done`] is called for its event.
pub struct CLILogger {
    events: EnumMap<Event, EventStats>,
    display_period: Duration,
    last_display: Instant,
}

impl CLILogger {
    pub fn new(display_period: Duration) -> Self {
        Self {
            events: EnumMap::default(),
            display_period,
            last_display: Instant::now(),
        }
    }

    /// Text of the current summary. Empty if no event finished since the last display.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (event, stats) in &self.events {
            if stats.count == stats.first {
                continue;
            }
            let header = format!(
                "==== {:?}s {} - {} ====",
                event,
                stats.first,
                stats.count - 1
            );
            let _ = writeln!(out, "{}", Paint::new(header).bold());
            for (name, stat) in &stats.stats {
                let _ = writeln!(out, "{}: {}", name, stat);
            }
        }
        out
    }

    /// Print the summary and start a new summary period.
    pub fn display(&mut self) {
        let summary = self.summary();
        if !summary.is_empty() {
            println!("\n{}", summary);
        }
        for stats in self.events.values_mut() {
            stats.reset();
        }
        self.last_display = Instant::now();
    }
}

impl Default for CLILogger {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Logger for CLILogger {
    fn log(&mut self, event: Event, name: &str, value: Loggable) -> Result<(), LogError> {
        self.events[event].stage(name, value)
    }

    fn done(&mut self, event: Event) {
        self.events[event].commit();
        if self.last_display.elapsed() >= self.display_period {
            self.display();
        }
    }
}

impl Drop for CLILogger {
    fn drop(&mut self) {
        self.display();
    }
}

/// Statistics of one event kind.
#[derive(Debug, Default)]
struct EventStats {
    /// Number of finished occurrences.
    count: u64,
    /// Value of `count` at the start of the summary period.
    first: u64,
    stats: BTreeMap<String, Stat>,
    /// Values logged during the unfinished occurrence.
    pending: BTreeMap<String, Loggable>,
}

impl EventStats {
    fn stage(&mut self, name: &str, value: Loggable) -> Result<(), LogError> {
        if let Some(stat) = self.stats.get(name) {
            stat.check(&value)
                .map_err(|expected| LogError::new(name, value.clone(), expected))?;
        }
        self.pending.insert(name.into(), value);
        Ok(())
    }

    fn commit(&mut self) {
        for (name, value) in std::mem::take(&mut self.pending) {
            self.stats
                .entry(name)
                .or_insert_with(|| Stat::for_value(&value))
                .insert(&value);
        }
        self.count += 1;
    }

    /// Clear the aggregates. Names stay registered so their types remain fixed.
    fn reset(&mut self) {
        for stat in self.stats.values_mut() {
            stat.clear();
        }
        self.first = self.count;
    }
}

/// Aggregate of the values logged under one name.
#[derive(Debug, Clone, PartialEq)]
enum Stat {
    Nothing,
    Mean { sum: f64, count: u64 },
    Histogram { counts: Vec<u64> },
}

impl Stat {
    fn for_value(value: &Loggable) -> Self {
        match value {
            Loggable::Nothing => Self::Nothing,
            Loggable::Scalar(_) => Self::Mean { sum: 0.0, count: 0 },
            Loggable::IndexSample { size, .. } => Self::Histogram {
                counts: vec![0; *size],
            },
        }
    }

    /// Check that `value` can be aggregated. On failure returns a description of what can.
    fn check(&self, value: &Loggable) -> Result<(), String> {
        match (self, value) {
            (Self::Nothing, Loggable::Nothing) | (Self::Mean { .. }, Loggable::Scalar(_)) => {
                Ok(())
            }
            (Self::Histogram { counts }, Loggable::IndexSample { value, size })
                if *size == counts.len() && value < size =>
            {
                Ok(())
            }
            (Self::Histogram { counts }, _) => Err(format!("IndexSample of size {}", counts.len())),
            (Self::Nothing, _) | (Self::Mean { .. }, _) => {
                Err(self.example().kind_name().into())
            }
        }
    }

    fn example(&self) -> Loggable {
        match self {
            Self::Nothing => Loggable::Nothing,
            Self::Mean { .. } => Loggable::Scalar(0.0),
            Self::Histogram { counts } => Loggable::IndexSample {
                value: 0,
                size: counts.len(),
            },
        }
    }

    fn insert(&mut self, value: &Loggable) {
        match (self, value) {
            (Self::Mean { sum, count }, Loggable::Scalar(x)) => {
                *sum += x;
                *count += 1;
            }
            (Self::Histogram { counts }, Loggable::IndexSample { value, .. }) => {
                if let Some(c) = counts.get_mut(*value) {
                    *c += 1;
                }
            }
            _ => {}
        }
    }

    fn clear(&mut self) {
        match self {
            Self::Nothing => {}
            Self::Mean { sum, count } => {
                *sum = 0.0;
                *count = 0;
            }
            Self::Histogram { counts } => counts.iter_mut().for_each(|c| *c = 0),
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Nothing => write!(f, "-"),
            Self::Mean { count: 0, .. } => write!(f, "None"),
            Self::Mean { sum, count } => write!(f, "{}", sum / *count as f64),
            Self::Histogram { counts } => {
                let total: u64 = counts.iter().sum();
                if total == 0 {
                    return write!(f, "None");
                }
                let freqs: Vec<_> = counts
                    .iter()
                    .map(|&c| format!("{:.3}", c as f64 / total as f64))
                    .collect();
                write!(f, "[{}]", freqs.join(", "))
            }
        }
    }
}
