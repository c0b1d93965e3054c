//! Latency of simulated links.

use std::fmt;
use std::time::Duration;

use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::Exp;
use rand_hc::Hc128Rng;

use crate::config::ChordConfig;
use crate::error::Error;
use crate::error::Result;

/// Samples the one-way delay of a packet. Every sample is bounded by [DelayModel::max_delay],
/// which is also the time a caller waits before it gives up on a peer.
pub trait DelayModel: fmt::Debug {
    fn sample_delay(&mut self) -> Duration;

    fn max_delay(&self) -> Duration;
}

/// Exponentially distributed delays with a given mean.
/// Samples above the bound are drawn again a few times, then clamped.
#[derive(Debug)]
pub struct ExponentialDelay {
    distribution: Exp<f64>,
    max_ms: u64,
    rng: Hc128Rng,
}

impl ExponentialDelay {
    const MAX_RESAMPLES: usize = 16;

    pub fn new(mean_ms: u64, max_ms: u64, seed: u64) -> Result<Self> {
        if mean_ms == 0 || max_ms < mean_ms {
            return Err(Error::InvalidConfig(format!(
                "cannot sample delays of mean {}ms bounded by {}ms",
                mean_ms, max_ms
            )));
        }
        let distribution = Exp::new(1.0 / mean_ms as f64)
            .map_err(|e| Error::InvalidConfig(format!("exponential delay: {}", e)))?;
        Ok(Self {
            distribution,
            max_ms,
            rng: Hc128Rng::seed_from_u64(seed),
        })
    }

    pub fn from_config(config: &ChordConfig, seed: u64) -> Result<Self> {
        Self::new(config.mean_packet_delay_ms, config.max_packet_delay_ms, seed)
    }
}

impl DelayModel for ExponentialDelay {
    fn sample_delay(&mut self) -> Duration {
        let bound = self.max_ms as f64;
        let mut sample = bound;
        for _ in 0..Self::MAX_RESAMPLES {
            let x = self.distribution.sample(&mut self.rng);
            if x <= bound {
                sample = x;
                break;
            }
        }
        Duration::from_millis(sample.round().min(bound) as u64)
    }

    fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

/// Every packet takes exactly the same time.
#[derive(Debug, Clone, Copy)]
pub struct ConstantDelay {
    delay: Duration,
    max: Duration,
}

impl ConstantDelay {
    pub fn new(delay: Duration, max: Duration) -> Self {
        Self {
            delay: delay.min(max),
            max,
        }
    }
}

impl DelayModel for ConstantDelay {
    fn sample_delay(&mut self) -> Duration {
        self.delay
    }

    fn max_delay(&self) -> Duration {
        self.max
    }
}
