//! Configuration for tdlpack
//!
//! Centralized configuration with sensible defaults.

use crate::cube::{AxisName, Filter, Filters, QuantizationPolicy};
use crate::ident::IdField;

/// Main configuration for archive access and dataset assembly
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // I/O Configuration
    // -------------------------------------------------------------------------
    /// Buffer size (in bytes) of the shared read handle and of writers
    pub buffer_size: usize,

    // -------------------------------------------------------------------------
    // Random-Access Configuration
    // -------------------------------------------------------------------------
    /// Slot template for new random-access archives
    pub ra_template: RaTemplate,

    // -------------------------------------------------------------------------
    // Dataset Assembly Configuration
    // -------------------------------------------------------------------------
    /// Identifier fields joined into a variable name
    pub name_scheme: Vec<IdField>,

    /// Per-axis record filters applied before grouping
    pub filters: Filters,

    // -------------------------------------------------------------------------
    // Read Configuration
    // -------------------------------------------------------------------------
    /// Threads used to decode records during a block read
    pub read_workers: usize,

    // -------------------------------------------------------------------------
    // Write Configuration
    // -------------------------------------------------------------------------
    /// How the decimal scale of written records is chosen
    pub quantization: QuantizationPolicy,

    /// Primary missing-value sentinel written for NaN
    pub primary_missing: f32,

    /// Secondary missing-value sentinel (0 = none)
    pub secondary_missing: f32,
}

/// Slot template of a random-access archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaTemplate {
    /// 1024-word slots, 300 entries per key record
    Small,
    /// 8192-word slots, 300 entries per key record
    Large,
}

impl RaTemplate {
    /// Words per slot
    pub fn nwords(self) -> i32 {
        match self {
            RaTemplate::Small => 1024,
            RaTemplate::Large => 8192,
        }
    }

    /// Entries per key record
    pub fn maxent(self) -> i32 {
        300
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_size: 1024 * 1024, // 1 MB
            ra_template: RaTemplate::Small,
            name_scheme: vec![IdField::Ccc, IdField::Fff],
            filters: Filters::new(),
            read_workers: 1,
            quantization: QuantizationPolicy::Auto { min_unique: 1000 },
            primary_missing: 9999.0,
            secondary_missing: 0.0,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the I/O buffer size (in bytes)
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Set the random-access slot template
    pub fn ra_template(mut self, template: RaTemplate) -> Self {
        self.config.ra_template = template;
        self
    }

    /// Set the identifier fields that name variables
    pub fn name_scheme(mut self, fields: impl IntoIterator<Item = IdField>) -> Self {
        self.config.name_scheme = fields.into_iter().collect();
        self
    }

    /// Add a filter on one axis, replacing any earlier filter for it
    pub fn filter(mut self, axis: AxisName, filter: Filter) -> Self {
        self.config.filters.insert(axis, filter);
        self
    }

    /// Set the number of block-read worker threads
    pub fn read_workers(mut self, workers: usize) -> Self {
        self.config.read_workers = workers.max(1);
        self
    }

    /// Set the quantization policy for writes
    pub fn quantization(mut self, policy: QuantizationPolicy) -> Self {
        self.config.quantization = policy;
        self
    }

    /// Set the primary and secondary missing-value sentinels
    pub fn missing_values(mut self, primary: f32, secondary: f32) -> Self {
        self.config.primary_missing = primary;
        self.config.secondary_missing = secondary;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
