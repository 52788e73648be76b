//! Runtime configuration and shared statistics.

use std::sync::Arc;

use log::warn;
use parking_lot::{Mutex, MutexGuard};

use crate::ddc::{
    retry::{RetryOperation, RetryPolicy, TryStats, MAX_MAX_TRIES},
    sleep::SleepStats,
};

/// Upper bound of multi-part fragments read before giving up on an end marker.
pub const DEFAULT_MAX_MULTI_PART_FRAGMENTS: usize = 64;

/// Tunables of the protocol engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct DdcConfig {
    pub write_only_tries: u8,
    pub write_read_tries: u8,
    pub multi_part_read_tries: u8,
    pub multi_part_write_tries: u8,
    /// re-read non table features after setting them
    pub verify_setvcp: bool,
    pub sleep_multiplier: f64,
    /// open displays even if no EDID can be read
    pub force_open: bool,
    /// detection runs one worker per display above this display count
    pub concurrent_detection_threshold: usize,
    pub max_multi_part_fragments: usize,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub retry_policy: RetryPolicy,
}

impl Default for DdcConfig {
    fn default() -> Self {
        Self {
            write_only_tries: RetryOperation::WriteOnly.default_max_tries(),
            write_read_tries: RetryOperation::WriteRead.default_max_tries(),
            multi_part_read_tries: RetryOperation::MultiPartRead.default_max_tries(),
            multi_part_write_tries: RetryOperation::MultiPartWrite.default_max_tries(),
            verify_setvcp: false,
            sleep_multiplier: 1.0,
            force_open: false,
            concurrent_detection_threshold: 3,
            max_multi_part_fragments: DEFAULT_MAX_MULTI_PART_FRAGMENTS,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl DdcConfig {
    pub fn max_tries(&self, operation: RetryOperation) -> u8 {
        let tries = match operation {
            RetryOperation::WriteOnly => self.write_only_tries,
            RetryOperation::WriteRead => self.write_read_tries,
            RetryOperation::MultiPartRead => self.multi_part_read_tries,
            RetryOperation::MultiPartWrite => self.multi_part_write_tries,
        };
        tries.clamp(1, MAX_MAX_TRIES)
    }

    /// Sets the try budget of an exchange class, clamped to `1..=MAX_MAX_TRIES`.
    pub fn with_max_tries(mut self, operation: RetryOperation, tries: u8) -> Self {
        let clamped = tries.clamp(1, MAX_MAX_TRIES);
        if clamped != tries {
            warn!(
                "max tries {tries} for {} out of range, using {clamped}",
                operation.description()
            );
        }
        match operation {
            RetryOperation::WriteOnly => self.write_only_tries = clamped,
            RetryOperation::WriteRead => self.write_read_tries = clamped,
            RetryOperation::MultiPartRead => self.multi_part_read_tries = clamped,
            RetryOperation::MultiPartWrite => self.multi_part_write_tries = clamped,
        }
        self
    }

    pub fn with_verify_setvcp(mut self, verify: bool) -> Self {
        self.verify_setvcp = verify;
        self
    }

    pub fn with_sleep_multiplier(mut self, multiplier: f64) -> Self {
        if multiplier.is_finite() && multiplier >= 0.0 {
            self.sleep_multiplier = multiplier;
        } else {
            warn!("ignoring invalid sleep multiplier {multiplier}");
        }
        self
    }

    pub fn with_force_open(mut self, force: bool) -> Self {
        self.force_open = force;
        self
    }

    pub fn with_concurrent_detection_threshold(mut self, threshold: usize) -> Self {
        self.concurrent_detection_threshold = threshold;
        self
    }

    pub fn with_max_multi_part_fragments(mut self, fragments: usize) -> Self {
        self.max_multi_part_fragments = fragments.max(1);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}

/// Configuration plus the statistics shared by all sessions of a process.
#[derive(Debug, Default)]
pub struct DdcContext {
    config: DdcConfig,
    try_stats: Mutex<TryStats>,
    sleep_stats: Mutex<SleepStats>,
}

impl DdcContext {
    pub fn new(config: DdcConfig) -> Self {
        Self {
            config,
            try_stats: Mutex::new(TryStats::default()),
            sleep_stats: Mutex::new(SleepStats::default()),
        }
    }

    pub fn shared(config: DdcConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn config(&self) -> &DdcConfig {
        &self.config
    }

    pub fn try_stats(&self) -> MutexGuard<'_, TryStats> {
        self.try_stats.lock()
    }

    pub fn sleep_stats(&self) -> MutexGuard<'_, SleepStats> {
        self.sleep_stats.lock()
    }

    /// Both statistics reports, try statistics first.
    pub fn report_stats(&self) -> String {
        let mut report = self.try_stats().report();
        report.push_str(&self.sleep_stats().report());
        report
    }

    pub fn reset_stats(&self) {
        self.try_stats().reset();
        self.sleep_stats().reset();
    }
}
