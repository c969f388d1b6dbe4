//! Pipeline configuration.

use crate::errors::{FanflowError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Prefix of every environment variable read by [`PipelineSettings::from_env`].
pub const ENV_PREFIX: &str = "FANFLOW_";

/// Tunables of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Number of transform branches sharing the source.
    pub branch_count: usize,
    /// The source emits `index % modulus`.
    pub modulus: usize,
    /// Deadline for the whole run in milliseconds.
    pub overall_deadline_ms: u64,
    /// Optional deadline for each branch in milliseconds.
    pub per_branch_deadline_ms: Option<u64>,
    /// How long to wait for stages to exit after cancelling.
    pub grace_period_ms: u64,
    /// Delay the driver waits after reading each value.
    pub consume_delay_ms: u64,
    /// Explicit branch labels. Defaults to `w1..wN`.
    pub branch_labels: Option<Vec<String>>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            branch_count: 2,
            modulus: 26,
            overall_deadline_ms: 500,
            per_branch_deadline_ms: None,
            grace_period_ms: 250,
            consume_delay_ms: 0,
            branch_labels: None,
        }
    }
}

impl PipelineSettings {
    /// Creates the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads settings from `FANFLOW_*` environment variables over the defaults.
    ///
    /// `FANFLOW_BRANCH_LABELS` is a comma separated list.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));
        let mut settings = Self::default();

        if let Some(v) = parse_var(&read, "BRANCH_COUNT")? {
            settings.branch_count = v;
        }
        if let Some(v) = parse_var(&read, "MODULUS")? {
            settings.modulus = v;
        }
        if let Some(v) = parse_var(&read, "OVERALL_DEADLINE_MS")? {
            settings.overall_deadline_ms = v;
        }
        if let Some(v) = parse_var(&read, "PER_BRANCH_DEADLINE_MS")? {
            settings.per_branch_deadline_ms = Some(v);
        }
        if let Some(v) = parse_var(&read, "GRACE_PERIOD_MS")? {
            settings.grace_period_ms = v;
        }
        if let Some(v) = parse_var(&read, "CONSUME_DELAY_MS")? {
            settings.consume_delay_ms = v;
        }
        if let Some(labels) = read("BRANCH_LABELS") {
            let labels: Vec<String> = labels
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();
            settings.branch_count = labels.len();
            settings.branch_labels = Some(labels);
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Checks the settings describe a runnable pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.branch_count == 0 {
            return Err(FanflowError::invalid_config("branch_count must be at least 1"));
        }
        if self.modulus == 0 {
            return Err(FanflowError::invalid_config("modulus must be at least 1"));
        }
        if self.overall_deadline_ms == 0 {
            return Err(FanflowError::invalid_config(
                "overall_deadline_ms must be positive",
            ));
        }
        if self.per_branch_deadline_ms == Some(0) {
            return Err(FanflowError::invalid_config(
                "per_branch_deadline_ms must be positive when set",
            ));
        }
        if let Some(labels) = &self.branch_labels {
            if labels.len() != self.branch_count {
                return Err(FanflowError::invalid_config(format!(
                    "{} branch labels given for {} branches",
                    labels.len(),
                    self.branch_count
                )));
            }
        }
        Ok(())
    }

    /// Sets the branch count.
    #[must_use]
    pub fn with_branch_count(mut self, count: usize) -> Self {
        self.branch_count = count;
        self
    }

    /// Sets the source modulus.
    #[must_use]
    pub fn with_modulus(mut self, modulus: usize) -> Self {
        self.modulus = modulus;
        self
    }

    /// Sets the overall deadline.
    #[must_use]
    pub fn with_overall_deadline(mut self, deadline: Duration) -> Self {
        self.overall_deadline_ms = duration_ms(deadline);
        self
    }

    /// Sets the per-branch deadline.
    #[must_use]
    pub fn with_per_branch_deadline(mut self, deadline: Duration) -> Self {
        self.per_branch_deadline_ms = Some(duration_ms(deadline));
        self
    }

    /// Sets the drain grace period.
    #[must_use]
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period_ms = duration_ms(grace);
        self
    }

    /// Sets the per-value consumer delay.
    #[must_use]
    pub fn with_consume_delay(mut self, delay: Duration) -> Self {
        self.consume_delay_ms = duration_ms(delay);
        self
    }

    /// Sets explicit branch labels, adjusting the branch count to match.
    #[must_use]
    pub fn with_branch_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        self.branch_count = labels.len();
        self.branch_labels = Some(labels);
        self
    }

    /// Returns the overall deadline.
    #[must_use]
    pub const fn overall_deadline(&self) -> Duration {
        Duration::from_millis(self.overall_deadline_ms)
    }

    /// Returns the per-branch deadline, if any.
    #[must_use]
    pub fn per_branch_deadline(&self) -> Option<Duration> {
        self.per_branch_deadline_ms.map(Duration::from_millis)
    }

    /// Returns the drain grace period.
    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Returns the per-value consumer delay.
    #[must_use]
    pub const fn consume_delay(&self) -> Duration {
        Duration::from_millis(self.consume_delay_ms)
    }

    /// Returns the label of every branch, in order.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.branch_labels.clone().unwrap_or_else(|| {
            (1..=self.branch_count).map(|i| format!("w{i}")).collect()
        })
    }
}

fn parse_var<T, F>(read: &F, suffix: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    read(suffix)
        .map(|raw| {
            raw.trim().parse().map_err(|e| {
                FanflowError::invalid_config(format!("{ENV_PREFIX}{suffix}={raw:?}: {e}"))
            })
        })
        .transpose()
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Everything one pipeline run needs: settings, a mapper and a termination predicate.
pub struct PipelineConfig<M, P> {
    /// Tunables.
    pub settings: PipelineSettings,
    /// Mapping applied by every branch.
    pub mapper: Arc<M>,
    /// Returns true for the value that ends the run.
    pub predicate: P,
}

impl<M, P> PipelineConfig<M, P> {
    /// Creates a config with default settings.
    pub fn new(mapper: M, predicate: P) -> Self {
        Self {
            settings: PipelineSettings::default(),
            mapper: Arc::new(mapper),
            predicate,
        }
    }

    /// Replaces the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the branch count.
    #[must_use]
    pub fn with_branch_count(mut self, count: usize) -> Self {
        self.settings = self.settings.with_branch_count(count);
        self
    }

    /// Sets the overall deadline.
    #[must_use]
    pub fn with_overall_deadline(mut self, deadline: Duration) -> Self {
        self.settings = self.settings.with_overall_deadline(deadline);
        self
    }

    /// Sets the per-branch deadline.
    #[must_use]
    pub fn with_per_branch_deadline(mut self, deadline: Duration) -> Self {
        self.settings = self.settings.with_per_branch_deadline(deadline);
        self
    }

    /// Sets explicit branch labels.
    #[must_use]
    pub fn with_branch_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings = self.settings.with_branch_labels(labels);
        self
    }

    /// Sets the per-value consumer delay.
    #[must_use]
    pub fn with_consume_delay(mut self, delay: Duration) -> Self {
        self.settings = self.settings.with_consume_delay(delay);
        self
    }

    /// Checks the settings.
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()
    }
}

impl<M, P> fmt::Debug for PipelineConfig<M, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
