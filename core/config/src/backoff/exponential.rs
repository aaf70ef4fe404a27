// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use duration_str::deserialize_duration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Strategy;
use crate::component::configuration::{Configuration, ConfigurationError};

/// Exponential retry policy for whole call attempts.
///
/// The first retry waits `initial_delay`; every following one multiplies the
/// previous delay by `multiplier`, capped at `max_delay`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    max_retries: u32,

    #[serde(
        default = "default_initial_delay",
        deserialize_with = "deserialize_duration"
    )]
    initial_delay: Duration,

    #[serde(default = "default_max_delay", deserialize_with = "deserialize_duration")]
    max_delay: Duration,

    #[serde(default = "default_multiplier")]
    multiplier: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: default_max_retries(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> Self {
        RetryPolicy {
            max_retries,
            initial_delay,
            max_delay,
            multiplier,
        }
    }

    pub fn with_max_retries(self, max_retries: u32) -> Self {
        RetryPolicy {
            max_retries,
            ..self
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Delay that follows `delay`: `min(delay * multiplier, max_delay)`.
    pub fn next_delay(&self, delay: Duration) -> Duration {
        scale(delay, self.multiplier, self.max_delay)
    }
}

fn scale(delay: Duration, multiplier: f64, max_delay: Duration) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * multiplier)
        .unwrap_or(max_delay)
        .min(max_delay)
}

impl Strategy for RetryPolicy {
    fn get_strategy(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        let multiplier = self.multiplier;
        let max_delay = self.max_delay;

        Box::new(
            std::iter::successors(Some(self.initial_delay.min(max_delay)), move |d| {
                Some(scale(*d, multiplier, max_delay))
            })
            .take(self.max_retries as usize),
        )
    }
}

impl std::fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RetryPolicy {{ max_retries: {}, initial_delay: {:?}, max_delay: {:?}, multiplier: {} }}",
            self.max_retries, self.initial_delay, self.max_delay, self.multiplier
        )
    }
}

impl Configuration for RetryPolicy {
    fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigurationError::ConfigError(format!(
                "retry multiplier must be a finite value >= 1.0, got {}",
                self.multiplier
            )));
        }

        if self.initial_delay > self.max_delay {
            return Err(ConfigurationError::ConfigError(format!(
                "retry initial_delay {:?} exceeds max_delay {:?}",
                self.initial_delay, self.max_delay
            )));
        }

        Ok(())
    }
}
