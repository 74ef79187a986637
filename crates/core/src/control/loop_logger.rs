use std::collections::HashMap;
use std::time::Instant;

/// Observer for control loop events.
///
/// Keeps the iteration code free of output concerns so the binary can print
/// throttled progress while tests stay silent.
pub trait LoopLogger: Send {
    /// Called once per completed iteration with the running count.
    fn iteration(&mut self, count: u64);

    /// Record how long a named stage took in one iteration.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces detected).
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit a report when the loop exits. Default: no-op.
    fn summary(&self) {}
}

pub struct NullLoopLogger;

impl LoopLogger for NullLoopLogger {
    fn iteration(&mut self, _count: u64) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running aggregate of one stage or metric. The loop runs indefinitely, so
/// samples are folded in rather than kept.
#[derive(Debug, Default, Clone, Copy)]
struct Aggregate {
    count: u64,
    total: f64,
    max: f64,
}

impl Aggregate {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        if self.count == 1 || value > self.max {
            self.max = value;
        }
    }

    fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Logger that tracks per-stage timings and metrics and reports a summary
/// when the loop exits.
///
/// Progress lines are throttled to every `throttle_iterations` iterations.
pub struct StatsLoopLogger {
    throttle_iterations: u64,
    timings: HashMap<String, Aggregate>,
    metrics: HashMap<String, Aggregate>,
    start_time: Instant,
    iterations: u64,
}

impl StatsLoopLogger {
    pub fn new(throttle_iterations: usize) -> Self {
        Self {
            throttle_iterations: throttle_iterations.max(1) as u64,
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            iterations: 0,
        }
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Average duration of `stage`, if it was ever recorded.
    pub fn average_timing(&self, stage: &str) -> Option<f64> {
        self.timings.get(stage).map(Aggregate::average)
    }

    pub fn average_metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(Aggregate::average)
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Control loop summary ({} iterations, {:.1}s total):",
            self.iterations,
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, agg) in stages {
            let pct = if elapsed_ms > 0.0 {
                agg.total / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:10}: avg {:6.1}ms  max {:6.1}ms  ({pct:4.1}%)",
                agg.average(),
                agg.max
            ));
        }

        let mut names: Vec<_> = self.metrics.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, agg) in names {
            lines.push(format!("  {name}: avg {:.1}  max {:.0}", agg.average(), agg.max));
        }

        if self.iterations > 0 && elapsed_ms > 0.0 {
            let rate = self.iterations as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {rate:.1} iterations/s"));
        }

        Some(lines.join("\n"))
    }
}

impl Default for StatsLoopLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl LoopLogger for StatsLoopLogger {
    fn iteration(&mut self, count: u64) {
        self.iterations = count;
        if count % self.throttle_iterations == 0 {
            let faces = self.average_metric("faces").unwrap_or(0.0);
            log::info!("Control loop: {count} iterations (avg {faces:.1} faces)");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().record(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
