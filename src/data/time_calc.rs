use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Named stage durations for one pipeline call.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeCalc {
    stages: Vec<(String, Duration)>,
}

impl TimeCalc {
    pub fn total(&self) -> Duration {
        self.stages.iter().map(|(_, d)| *d).sum::<Duration>()
    }

    /// Adds `x` to the stage named `stage`, creating it if needed.
    pub fn add_or_push(&mut self, stage: &str, x: Duration) {
        match self.stages.iter_mut().find(|(name, _)| name == stage) {
            Some((_, elem)) => *elem += x,
            None => self.stages.push((stage.to_string(), x)),
        }
    }

    pub fn get(&self, stage: &str) -> Option<Duration> {
        self.stages.iter().find(|(name, _)| name == stage).map(|(_, d)| *d)
    }

    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .stages
            .iter()
            .map(|(name, d)| format!("{}: {:.2?}", name, d))
            .collect();
        format!("{} | Total: {:.2?}", parts.join(" | "), self.total())
    }
}
