//! Scenario definitions
//!
//! How many virtual users run over time. Durations use the k6 notation
//! (`30s`, `1m30s`, `500ms`) both on the command line and in config files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::ScheduleError;

/// Default time a stopping virtual user gets to finish its iteration
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

/// One ramping stage: move linearly to `target` over `duration`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(with = "k6_duration")]
    pub duration: Duration,
    pub target: u32,
}

impl Stage {
    pub fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }
}

/// Virtual user schedule of a scenario
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "executor", rename_all = "kebab-case")]
pub enum Executor {
    /// Fixed number of users for a fixed time
    ConstantVus {
        vus: u32,
        #[serde(with = "k6_duration")]
        duration: Duration,
    },
    /// User count follows the stages
    RampingVus {
        #[serde(rename = "startVUs", default)]
        start_vus: u32,
        stages: Vec<Stage>,
    },
}

impl Executor {
    /// Number of users wanted `elapsed` into the scenario
    pub fn target_at(&self, elapsed: Duration) -> u32 {
        match self {
            Executor::ConstantVus { vus, duration } => {
                if elapsed < *duration {
                    *vus
                } else {
                    0
                }
            }
            Executor::RampingVus { start_vus, stages } => {
                let mut from = *start_vus;
                let mut stage_start = Duration::ZERO;

                for stage in stages {
                    let stage_end = stage_start.saturating_add(stage.duration);
                    if elapsed < stage_end {
                        let progress = (elapsed - stage_start).as_secs_f64()
                            / stage.duration.as_secs_f64();
                        let delta = stage.target as f64 - from as f64;
                        return (from as f64 + delta * progress).round() as u32;
                    }
                    from = stage.target;
                    stage_start = stage_end;
                }
                from
            }
        }
    }

    /// Time until the schedule wants no more iterations
    ///
    /// Saturates at `Duration::MAX`; `validate` rejects schedules that would.
    pub fn total_duration(&self) -> Duration {
        self.checked_total_duration().unwrap_or(Duration::MAX)
    }

    fn checked_total_duration(&self) -> Option<Duration> {
        match self {
            Executor::ConstantVus { duration, .. } => Some(*duration),
            Executor::RampingVus { stages, .. } => stages
                .iter()
                .try_fold(Duration::ZERO, |total, s| total.checked_add(s.duration)),
        }
    }

    /// Highest user count the schedule ever asks for
    pub fn max_vus(&self) -> u32 {
        match self {
            Executor::ConstantVus { vus, .. } => *vus,
            Executor::RampingVus { start_vus, stages } => stages
                .iter()
                .map(|s| s.target)
                .fold(*start_vus, u32::max),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Executor::ConstantVus { .. } => "constant-vus",
            Executor::RampingVus { .. } => "ramping-vus",
        }
    }
}

/// A named schedule
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub name: String,
    #[serde(flatten)]
    pub executor: Executor,
    /// Offset from the start of the run
    #[serde(default, with = "k6_duration")]
    pub start_time: Duration,
    #[serde(default = "default_graceful_stop", with = "k6_duration")]
    pub graceful_stop: Duration,
}

fn default_graceful_stop() -> Duration {
    DEFAULT_GRACEFUL_STOP
}

impl Scenario {
    pub fn new(name: impl Into<String>, executor: Executor) -> Self {
        Self {
            name: name.into(),
            executor,
            start_time: Duration::ZERO,
            graceful_stop: DEFAULT_GRACEFUL_STOP,
        }
    }

    /// Set start offset
    #[cfg(test)]
    pub fn with_start_time(mut self, start_time: Duration) -> Self {
        self.start_time = start_time;
        self
    }

    /// Set graceful stop
    #[cfg(test)]
    pub fn with_graceful_stop(mut self, graceful_stop: Duration) -> Self {
        self.graceful_stop = graceful_stop;
        self
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Ad-hoc constant scenario from `--vus` / `--duration`
    pub fn constant(vus: u32, duration: Duration) -> Self {
        Self::new("default", Executor::ConstantVus { vus, duration })
    }

    /// Time from run start until this scenario stops scheduling
    pub fn end_offset(&self) -> Duration {
        self.start_time.saturating_add(self.executor.total_duration())
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        let invalid = |reason: &str| ScheduleError::InvalidScenario {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        match &self.executor {
            Executor::ConstantVus { vus, duration } => {
                if *vus == 0 {
                    return Err(invalid("vus must be greater than 0"));
                }
                if duration.is_zero() {
                    return Err(invalid("duration must be greater than 0"));
                }
            }
            Executor::RampingVus { stages, .. } => {
                if stages.is_empty() {
                    return Err(invalid("at least one stage is required"));
                }
                if self.executor.total_duration().is_zero() {
                    return Err(invalid("stages have no duration"));
                }
            }
        }

        let end = self
            .executor
            .checked_total_duration()
            .and_then(|total| self.start_time.checked_add(total));
        if end.is_none() {
            return Err(invalid("start time plus duration is too long"));
        }
        Ok(())
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.executor {
            Executor::ConstantVus { vus, duration } => write!(
                f,
                "{} ({}: {} VUs for {})",
                self.name,
                self.executor.name(),
                vus,
                format_duration(*duration)
            ),
            Executor::RampingVus { start_vus, stages } => {
                write!(f, "{} ({}: {}", self.name, self.executor.name(), start_vus)?;
                for stage in stages {
                    write!(f, " -> {} in {}", stage.target, format_duration(stage.duration))?;
                }
                write!(f, ")")
            }
        }
    }
}

/// The scenarios the reference traffic mix runs together
pub fn predefined() -> Vec<Scenario> {
    let secs = Duration::from_secs;
    vec![
        Scenario::new(
            "normal",
            Executor::ConstantVus {
                vus: 50,
                duration: secs(30),
            },
        ),
        Scenario::new(
            "spike",
            Executor::RampingVus {
                start_vus: 0,
                stages: vec![
                    Stage::new(secs(10), 100),
                    Stage::new(secs(20), 100),
                    Stage::new(secs(10), 0),
                ],
            },
        ),
        Scenario::new(
            "stress",
            Executor::RampingVus {
                start_vus: 0,
                stages: vec![
                    Stage::new(secs(30), 200),
                    Stage::new(secs(60), 200),
                    Stage::new(secs(30), 0),
                ],
            },
        ),
    ]
}

/// Pick scenarios by name, keeping the order asked for
pub fn select(available: &[Scenario], names: &[String]) -> Result<Vec<Scenario>, ScheduleError> {
    names
        .iter()
        .map(|name| {
            available
                .iter()
                .find(|s| &s.name == name)
                .cloned()
                .ok_or_else(|| ScheduleError::UnknownScenario(name.clone()))
        })
        .collect()
}

/// Parse a k6 duration: `500ms`, `30s`, `2m`, `1h`, `1m30s`, or bare seconds
pub fn parse_duration(input: &str) -> Result<Duration, ScheduleError> {
    let err = || ScheduleError::InvalidDuration(input.to_string());
    let s = input.trim();
    if s.is_empty() {
        return Err(err());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = 0.0_f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(err)?;
        let value: f64 = rest[..num_end].parse().map_err(|_| err())?;
        rest = &rest[num_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let millis = match &rest[..unit_end] {
            "ms" => 1.0,
            "s" => 1_000.0,
            "m" => 60_000.0,
            "h" => 3_600_000.0,
            _ => return Err(err()),
        };
        total += value * millis;
        rest = &rest[unit_end..];
    }

    Duration::try_from_secs_f64(total / 1000.0).map_err(|_| err())
}

/// Render a duration the way `parse_duration` reads it
pub fn format_duration(duration: Duration) -> String {
    let mut ms = duration.as_millis();
    if ms == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, size) in [("h", 3_600_000), ("m", 60_000), ("s", 1_000), ("ms", 1)] {
        if ms >= size {
            out.push_str(&format!("{}{}", ms / size, unit));
            ms %= size;
        }
    }
    out
}

/// Serde adapter for k6 duration strings
pub mod k6_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
