//! YAML configuration of a simulation run.
use std::fs;
use std::io;

use chordsim_core::ChordConfig;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;
use crate::util::ensure_parent_dir;
use crate::util::expand_home;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_CONFIG_LOCATION: &str = "~/.chordsim/config.yaml";
pub const DEFAULT_END_TIME_MS: u64 = 120_000;

/// How the first nodes enter the ring.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct InitConfig {
    pub init_num_nodes: usize,
    /// Join nodes one by one through random seeds instead of preloading the ring.
    pub one_at_time_init: bool,
    pub insertion_delay_ms: u64,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            init_num_nodes: 32,
            one_at_time_init: false,
            insertion_delay_ms: 3001,
        }
    }
}

/// Payloads stored once the ring is initialized.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DataConfig {
    /// Number of distinct keys.
    pub total_number_data: usize,
    /// Leading characters of a payload hashed to its key.
    pub key_size: usize,
    pub data_size: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            total_number_data: 200,
            key_size: 8,
            data_size: 32,
        }
    }
}

/// Periodic batches of graceful leaves, each followed by a batch of joins.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChurnConfig {
    /// Delay between the end of a leave batch and the following join batch.
    pub join_interval_ms: u64,
    pub min_number_joins: usize,
    /// A join batch has `min_number_joins + uniform(0..=join_amplitude)` nodes.
    pub join_amplitude: usize,
    /// Zero disables churn.
    pub leave_interval_ms: u64,
    pub min_number_leaving: usize,
    pub leaving_amplitude: usize,
}

impl Default for ChurnConfig {
    fn default() -> Self {
        Self {
            join_interval_ms: 4000,
            min_number_joins: 2,
            join_amplitude: 2,
            leave_interval_ms: 15_000,
            min_number_leaving: 1,
            leaving_amplitude: 2,
        }
    }
}

/// Random crashes, each recovered after a fixed time.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CrashConfig {
    /// Probability for an active node to crash at each draw.
    pub crash_pr: f64,
    pub crash_scheduling_interval_ms: u64,
    pub recovery_interval_ms: u64,
}

impl Default for CrashConfig {
    fn default() -> Self {
        Self {
            crash_pr: 0.0,
            crash_scheduling_interval_ms: 5000,
            recovery_interval_ms: 8000,
        }
    }
}

/// Periodic batches of lookups.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LookupConfig {
    pub lookup_interval_ms: u64,
    /// Distinct active nodes issuing a lookup in each batch.
    pub number_lookup: usize,
    /// Every node of a batch looks up the same key.
    pub one_key_lookup: bool,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            lookup_interval_ms: 2000,
            number_lookup: 10,
            one_key_lookup: false,
        }
    }
}

/// Everything a run needs: protocol parameters plus the policies driving the ring.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub chord: ChordConfig,
    pub init: InitConfig,
    pub data: DataConfig,
    pub churn: ChurnConfig,
    pub crashes: CrashConfig,
    pub lookups: LookupConfig,
    /// Virtual time at which the run stops and the report is written.
    pub end_time_ms: u64,
    /// CSV report location, a timestamped file in the working directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            chord: ChordConfig::default(),
            init: InitConfig::default(),
            data: DataConfig::default(),
            churn: ChurnConfig::default(),
            crashes: CrashConfig::default(),
            lookups: LookupConfig::default(),
            end_time_ms: DEFAULT_END_TIME_MS,
            output: None,
        }
    }
}

impl SimulationConfig {
    pub fn write_fs<P>(&self, path: P) -> Result<String>
    where P: AsRef<std::path::Path> {
        let path = expand_home(path)?;
        ensure_parent_dir(&path)?;
        let f =
            fs::File::create(path.as_path()).map_err(|e| Error::CreateFileError(e.to_string()))?;
        let f_writer = io::BufWriter::new(f);
        serde_yaml::to_writer(f_writer, self)?;
        Ok(path.to_string_lossy().to_string())
    }

    /// Read and normalize a config file.
    pub fn read_fs<P>(path: P) -> Result<SimulationConfig>
    where P: AsRef<std::path::Path> {
        let path = expand_home(path)?;
        tracing::debug!("Read config from: {:?}", path);
        let f = fs::File::open(path).map_err(|e| Error::OpenFileError(e.to_string()))?;
        let f_rdr = io::BufReader::new(f);
        let config: SimulationConfig = serde_yaml::from_reader(f_rdr)?;
        config.normalized()
    }

    /// Validate the config, raising too short intervals and clamping sizes.
    pub fn normalized(mut self) -> Result<Self> {
        self.chord.validate()?;

        let ring_size = self.ring_size();
        if self.init.init_num_nodes == 0 || self.init.init_num_nodes as u64 > ring_size {
            return Err(Error::InvalidConfig(format!(
                "init_num_nodes must be in 1..={}, got {}",
                ring_size, self.init.init_num_nodes
            )));
        }
        if self.data.total_number_data as u64 > ring_size {
            return Err(Error::InvalidConfig(format!(
                "{} distinct keys do not fit in a ring of {} ids",
                self.data.total_number_data, ring_size
            )));
        }
        if !(0.0..=1.0).contains(&self.crashes.crash_pr) {
            return Err(Error::InvalidConfig(format!(
                "crash_pr must be a probability, got {}",
                self.crashes.crash_pr
            )));
        }
        if self.crashes.crash_pr > 0.0 && self.crashes.crash_scheduling_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "crash_scheduling_interval_ms must be positive when crashes are enabled"
                    .to_string(),
            ));
        }

        if self.data.key_size > self.data.data_size {
            tracing::warn!(
                "key_size {} exceeds data_size {}, clamped",
                self.data.key_size,
                self.data.data_size
            );
            self.data.key_size = self.data.data_size;
        }
        if self.data.total_number_data > 0 && self.data.key_size == 0 {
            return Err(Error::InvalidConfig(
                "key_size must be at least 1".to_string(),
            ));
        }

        // a new node needs one full stabilization round before the next one arrives
        let period = self.chord.stabilize_offset_ms + self.chord.stabilize_amplitude_ms;
        for (name, interval) in [
            ("insertion_delay_ms", &mut self.init.insertion_delay_ms),
            ("join_interval_ms", &mut self.churn.join_interval_ms),
        ] {
            if *interval <= period {
                tracing::warn!("{} {} raised to {}", name, interval, period + 1);
                *interval = period + 1;
            }
        }
        Ok(self)
    }

    /// Number of ids on the ring.
    pub fn ring_size(&self) -> u64 {
        1u64 << self.chord.hash_bits
    }
}
