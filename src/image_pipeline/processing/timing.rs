use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

#[derive(Debug, Clone)]
pub struct StageTiming {
    pub name: String,
    pub duration: Duration,
}

/// Wall clock time spent per pipeline step, in call order.
#[derive(Debug, Default)]
pub struct StageTimings {
    steps: Vec<StageTiming>,
    step_map: HashMap<String, Duration>,
}

impl StageTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&mut self, name: impl Into<String>, duration: Duration) {
        let name = name.into();
        self.steps.push(StageTiming { name: name.clone(), duration });
        *self.step_map.entry(name).or_insert(Duration::ZERO) += duration;
    }

    pub fn record(&mut self, timer: Timer) {
        let (name, duration) = timer.stop();
        self.add_step(name, duration);
    }

    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(|s| s.duration).sum()
    }

    pub fn get_step(&self, name: &str) -> Option<Duration> {
        self.step_map.get(name).copied()
    }

    pub fn steps(&self) -> &[StageTiming] {
        &self.steps
    }

    pub fn clear(&mut self) {
        self.steps.clear();
        self.step_map.clear();
    }

    pub fn log_summary(&self) {
        let total = self.total_duration();
        for step in &self.steps {
            let percentage = if total.as_secs_f64() > 0.0 {
                (step.duration.as_secs_f64() / total.as_secs_f64()) * 100.0
            } else {
                0.0
            };
            debug!(
                step = %step.name,
                ms = step.duration.as_secs_f64() * 1000.0,
                percentage,
                "Stage timing"
            );
        }
        debug!(ms = total.as_secs_f64() * 1000.0, "Total processing time");
    }
}

pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn start(name: impl Into<String>) -> Self {
        Self { start: Instant::now(), name: name.into() }
    }

    pub fn stop(self) -> (String, Duration) {
        (self.name, self.start.elapsed())
    }
}
