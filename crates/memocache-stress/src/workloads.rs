use std::thread;
use std::time::Duration;

use memocache::{Created, Creator};
use rand::Rng;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WorkloadsConfig {
    pub workloads: Vec<Workload>,
}

#[derive(Debug, Deserialize)]
pub struct Workload {
    /// Number of threads calling into the cache.
    pub concurrency: usize,
    #[serde(flatten)]
    pub keys: KeyDistribution,
    /// Simulated duration of every creation.
    #[serde(default, with = "humantime_serde")]
    pub latency: Duration,
    /// Lifetime of created values. Values live until evicted if unset.
    #[serde(default, with = "humantime_serde")]
    pub ttl: Option<Duration>,
    /// Probability of a creation to fail, between `0.0` and `1.0`.
    #[serde(default)]
    pub failure_rate: f64,
}

/// Which keys a workload requests.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum KeyDistribution {
    /// All of the given number of keys are equally likely.
    Uniform(usize),
    /// `hot_ratio` of all requests go to the first `hot` keys, the rest is spread over all `keys`.
    Hotset {
        keys: usize,
        hot: usize,
        hot_ratio: f64,
    },
}

impl KeyDistribution {
    pub fn sample<R: Rng>(&self, rng: &mut R) -> String {
        let index = match *self {
            KeyDistribution::Uniform(keys) => rng.random_range(0..keys.max(1)),
            KeyDistribution::Hotset {
                keys,
                hot,
                hot_ratio,
            } => {
                let keys = keys.max(1);
                if rng.random_bool(hot_ratio.clamp(0.0, 1.0)) {
                    rng.random_range(0..hot.clamp(1, keys))
                } else {
                    rng.random_range(0..keys)
                }
            }
        };
        format!("key-{index}")
    }
}

#[derive(Debug, thiserror::Error)]
#[error("simulated failure creating {key:?}")]
pub struct SimulatedFailure {
    key: String,
}

/// Creates values after sleeping for the workload's latency, failing at its failure rate.
#[derive(Debug)]
pub struct SimulatedCreator {
    latency: Duration,
    ttl: Option<Duration>,
    failure_rate: f64,
}

impl SimulatedCreator {
    pub fn new(workload: &Workload) -> Self {
        Self {
            latency: workload.latency,
            ttl: workload.ttl,
            failure_rate: workload.failure_rate.clamp(0.0, 1.0),
        }
    }
}

impl Creator<String> for SimulatedCreator {
    type Value = String;
    type Error = SimulatedFailure;

    fn create(&self, key: &String) -> Result<Created<String>, SimulatedFailure> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        if self.failure_rate > 0.0 && rand::rng().random_bool(self.failure_rate) {
            return Err(SimulatedFailure { key: key.clone() });
        }

        let value = format!("value of {key}");
        Ok(match self.ttl {
            Some(ttl) => Created::expires_in(value, ttl),
            None => Created::new(value),
        })
    }
}
