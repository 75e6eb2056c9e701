//! Configuration types for the updater
//!
//! This module defines the record set a run manages and the configuration of
//! each pluggable component.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default "what is my IP" endpoint
pub const DEFAULT_IP_URL: &str = "http://checkip.amazonaws.com/";

/// Default record TTL in seconds
pub const DEFAULT_TTL: i64 = 300;

/// Default AWS shared-credentials profile
pub const DEFAULT_PROFILE: &str = "dyndns53";

/// Default change batch comment
pub const DEFAULT_COMMENT: &str = "dyndns53";

/// Main updater configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// The record set to keep in sync
    pub record: RecordSet,

    /// IP source configuration
    #[serde(default)]
    pub ip_source: IpSourceConfig,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Local cache configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl DdnsConfig {
    /// Create a configuration with default source, store and engine settings
    pub fn new(record: RecordSet, provider: ProviderConfig) -> Self {
        Self {
            record,
            ip_source: IpSourceConfig::default(),
            provider,
            state_store: StateStoreConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.record.validate()?;
        self.provider.validate_for(&self.record)?;
        self.ip_source.validate()?;
        self.state_store.validate()?;

        Ok(())
    }
}

/// DNS record type managed by the updater
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    /// A record (IPv4)
    A,
    /// AAAA record (IPv6)
    Aaaa,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// Whether an address belongs to the family this record type holds
    pub fn matches(&self, ip: &IpAddr) -> bool {
        match self {
            RecordType::A => ip.is_ipv4(),
            RecordType::Aaaa => ip.is_ipv6(),
        }
    }

    /// The IP version this record type holds
    pub fn ip_version(&self) -> IpVersion {
        match self {
            RecordType::A => IpVersion::V4,
            RecordType::Aaaa => IpVersion::V6,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Err(Error::invalid_input("missing record set type")),
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            other => Err(Error::invalid_input(format!(
                "invalid record set type: {}",
                other
            ))),
        }
    }
}

/// IP version filter for IP sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    /// IPv4 only
    V4,
    /// IPv6 only
    V6,
    /// Either family
    Both,
}

/// The single DNS record set a run manages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Fully qualified record name; always ends with "."
    pub name: String,

    /// Record type
    pub record_type: RecordType,

    /// Time to live in seconds
    #[serde(default = "default_ttl")]
    pub ttl: i64,

    /// Hosted zone id
    ///
    /// Required by Route 53. Cloudflare can look the zone up by name.
    #[serde(default)]
    pub zone_id: Option<String>,
}

impl RecordSet {
    /// Create a record set without validating it
    pub fn new(name: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            name: name.into(),
            record_type,
            ttl: DEFAULT_TTL,
            zone_id: None,
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the hosted zone id
    pub fn with_zone_id(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id.into());
        self
    }

    /// Build a record set from raw parameters, checking them in the order the
    /// command line reports problems
    pub fn from_parts(name: &str, record_type: &str, ttl: i64, zone_id: &str) -> Result<Self> {
        check_name(name)?;
        let record_type: RecordType = record_type.parse()?;
        check_ttl(ttl)?;

        let record = Self {
            name: name.to_string(),
            record_type,
            ttl,
            zone_id: (!zone_id.is_empty()).then(|| zone_id.to_string()),
        };
        record.validate()?;
        Ok(record)
    }

    /// Validate the record set
    pub fn validate(&self) -> Result<()> {
        check_name(&self.name)?;
        check_ttl(self.ttl)?;
        validate_domain_name(self.domain())
    }

    /// Record name without the trailing dot
    pub fn domain(&self) -> &str {
        self.name.strip_suffix('.').unwrap_or(&self.name)
    }

    /// Hosted zone id, or the "missing hosted zone id" error
    pub fn require_zone_id(&self) -> Result<&str> {
        match self.zone_id.as_deref() {
            Some(zone) if !zone.is_empty() => Ok(zone),
            _ => Err(Error::invalid_input("missing hosted zone id")),
        }
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_input("missing record set name"));
    }
    if !name.ends_with('.') {
        return Err(Error::invalid_input(r#"record set name must end with a ".""#));
    }
    Ok(())
}

fn check_ttl(ttl: i64) -> Result<()> {
    if ttl < 1 {
        return Err(Error::invalid_input(format!("invalid record set TTL: {}", ttl)));
    }
    Ok(())
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks; catches typos, not every malformed name.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::invalid_input("record set name has no labels"));
    }

    if domain.len() > 253 {
        return Err(Error::invalid_input(format!(
            "record set name too long: {} chars (max 253)",
            domain.len()
        )));
    }

    for (index, label) in domain.split('.').enumerate() {
        // Wildcard record sets: "*" as the whole leftmost label.
        if index == 0 && label == "*" {
            continue;
        }

        if label.is_empty() {
            return Err(Error::invalid_input(format!(
                "record set name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(Error::invalid_input(format!(
                "record set label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::invalid_input(format!(
                "record set label contains invalid characters: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::invalid_input(format!(
                "record set label cannot start or end with hyphen: '{}'",
                label
            )));
        }
    }

    Ok(())
}

fn default_ttl() -> i64 {
    DEFAULT_TTL
}

/// IP source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpSourceConfig {
    /// HTTP "what is my IP" endpoint returning the address as plain text
    Http {
        /// URL to fetch the IP from
        url: String,
        /// Request timeout in seconds
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },

    /// Custom IP source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl IpSourceConfig {
    /// Validate the IP source configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            IpSourceConfig::Http { url, timeout_secs } => {
                if url.is_empty() {
                    return Err(Error::config("IP source URL cannot be empty"));
                }
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(Error::config(format!(
                        "IP source URL must use HTTP or HTTPS scheme. Got: {}",
                        url
                    )));
                }
                if *timeout_secs == 0 {
                    return Err(Error::config("IP source timeout must be > 0"));
                }
                Ok(())
            }
            IpSourceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(Error::config("Custom IP source factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(Error::config("Custom IP source config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the IP source type name
    pub fn type_name(&self) -> &str {
        match self {
            IpSourceConfig::Http { .. } => "http",
            IpSourceConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for IpSourceConfig {
    fn default() -> Self {
        IpSourceConfig::Http {
            url: DEFAULT_IP_URL.to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// AWS Route 53
    Route53 {
        /// Profile in the shared credentials file
        profile: String,
        /// Shared credentials file (defaults to ~/.aws/credentials)
        credentials_file: Option<PathBuf>,
        /// Signing region (Route 53 is global; defaults to us-east-1)
        region: Option<String>,
    },

    /// Cloudflare
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Route 53 with the default profile and credentials file
    pub fn route53() -> Self {
        ProviderConfig::Route53 {
            profile: DEFAULT_PROFILE.to_string(),
            credentials_file: None,
            region: None,
        }
    }

    /// Validate the provider configuration against the record it will manage
    pub fn validate_for(&self, record: &RecordSet) -> Result<()> {
        match self {
            ProviderConfig::Route53 { profile, .. } => {
                record.require_zone_id()?;
                if profile.is_empty() {
                    return Err(Error::config("Route 53 credentials profile cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Cloudflare { api_token } => {
                if api_token.is_empty() {
                    return Err(Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(Error::config("Custom provider factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(Error::config("Custom provider config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Route53 { .. } => "route53",
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Local cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// No cache; compare against what the name resolves to
    #[default]
    None,

    /// JSON cache file
    File {
        /// Path to the cache file
        path: PathBuf,
    },

    /// In-memory cache (library use and tests)
    Memory,
}

impl StateStoreConfig {
    /// Validate the cache configuration
    pub fn validate(&self) -> Result<()> {
        if let StateStoreConfig::File { path } = self
            && path.as_os_str().is_empty()
        {
            return Err(Error::config("cache file path cannot be empty"));
        }
        Ok(())
    }
}

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Log the intended change instead of sending it
    #[serde(default)]
    pub dry_run: bool,

    /// Skip the cache and DNS comparison and always upsert
    #[serde(default)]
    pub force: bool,

    /// Comment attached to the change batch, where the provider supports one
    #[serde(default)]
    pub comment: Option<String>,

    /// Ignore cache entries older than this and fall back to DNS (seconds)
    #[serde(default)]
    pub cache_max_age_secs: Option<u64>,
}

impl EngineConfig {
    /// Change comment, falling back to the program name
    pub fn comment(&self) -> &str {
        self.comment.as_deref().unwrap_or(DEFAULT_COMMENT)
    }
}
