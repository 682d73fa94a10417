use crate::crawler::DEFAULT_TIERS;
use crate::publish::{ConnectionInfo, Destination};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Driftnet
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub extract: ExtractConfig,
    #[serde(default)]
    pub sink: Option<SinkConfig>,
}

/// Crawl engine configuration
///
/// Only `starting-id` and `step` are required; everything else has a default.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// First identifier to crawl
    #[serde(rename = "starting-id")]
    pub starting_id: i64,

    /// Signed, nonzero increment applied after every identifier
    pub step: i64,

    /// Consecutive empty results tolerated before idling (forward only)
    #[serde(rename = "skip-max", default = "default_skip_max")]
    pub skip_max: usize,

    /// Number of retry tiers a target climbs before it is dropped
    #[serde(rename = "skip-max-retries", default = "default_tiers")]
    pub tiers: usize,

    /// Interval between retry drains (seconds)
    #[serde(rename = "check-every", default = "default_check_every")]
    pub check_every: u64,

    /// Per-fetch timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Pause once the crawler caught up with publication (seconds)
    #[serde(rename = "idle-time", default = "default_idle_time")]
    pub idle_time: u64,

    /// Honor per-target delays; defaults to on when crawling backward
    #[serde(default)]
    pub calm: Option<bool>,

    /// Inclusive identifier to stop at
    #[serde(rename = "ending-id", default)]
    pub ending_id: Option<i64>,

    /// Crawl only these URLs instead of walking the cursor
    #[serde(default)]
    pub targets: Vec<String>,
}

fn default_skip_max() -> usize {
    15
}

fn default_tiers() -> usize {
    DEFAULT_TIERS
}

fn default_check_every() -> u64 {
    180
}

fn default_timeout() -> u64 {
    30
}

fn default_idle_time() -> u64 {
    30
}

impl EngineConfig {
    /// Creates a config with every optional setting at its default
    pub fn new(starting_id: i64, step: i64) -> Self {
        Self {
            starting_id,
            step,
            skip_max: default_skip_max(),
            tiers: default_tiers(),
            check_every: default_check_every(),
            timeout: default_timeout(),
            idle_time: default_idle_time(),
            calm: None,
            ending_id: None,
            targets: Vec::new(),
        }
    }

    /// Whether per-target delays are honored
    pub fn calm_mode(&self) -> bool {
        self.calm.unwrap_or(self.step < 0)
    }

    pub fn check_every(&self) -> Duration {
        Duration::from_secs(self.check_every)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn idle_time(&self) -> Duration {
        Duration::from_secs(self.idle_time)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Extraction configuration for the selector-driven extractor
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    /// Name of the extractor, used in the engine name
    #[serde(default = "default_extractor_name")]
    pub name: String,

    /// Address of a cursor target, `{id}` is replaced by the identifier
    #[serde(rename = "url-template", default)]
    pub url_template: Option<String>,

    /// Record fields and the selectors they are read from
    #[serde(default)]
    pub fields: BTreeMap<String, FieldConfig>,

    /// Fields that must be present, otherwise the page has no content yet
    #[serde(default)]
    pub required: Vec<String>,

    /// Selector marking pages that must not be indexed
    #[serde(rename = "skip-if", default)]
    pub skip_if: Option<String>,

    /// Pause after every published target in calm mode (milliseconds)
    #[serde(rename = "delay-ms", default)]
    pub delay_ms: Option<u64>,
}

fn default_extractor_name() -> String {
    "Crawler".to_string()
}

/// A single record field
#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    /// CSS selector
    pub selector: String,

    /// Read this attribute instead of the text content
    #[serde(default)]
    pub attribute: Option<String>,

    /// Collect every match into an array
    #[serde(default)]
    pub multiple: bool,
}

/// Message sink configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// Server URL (e.g., "nats://localhost:4222")
    pub url: String,

    /// Subject records are published to
    pub subject: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl SinkConfig {
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            url: self.url.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }

    pub fn destination(&self) -> Destination {
        Destination {
            subject: self.subject.clone(),
        }
    }
}
