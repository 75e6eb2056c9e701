// # Route 53 DNS Provider
//
// Upserts a record set in an AWS Route 53 hosted zone.
//
// ## API
//
// One `ChangeResourceRecordSets` call per run carrying a single `UPSERT`
// change: Route 53 creates the record set if it is missing and replaces it
// otherwise, so no read is needed first.
//
// ## Credentials
//
// Read from the shared credentials file, `~/.aws/credentials` unless
// configured otherwise, using a named profile (`dyndns53` by default):
//
// ```ini
// [dyndns53]
// aws_access_key_id = AKIA...
// aws_secret_access_key = ...
// ```
//
// The profile only needs `route53:ChangeResourceRecordSets` on the zone.
//
// ## Region
//
// Route 53 is a global service; requests are signed for `us-east-1` unless
// another region is configured.

use async_trait::async_trait;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_route53::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_route53::operation::change_resource_record_sets::ChangeResourceRecordSetsError;
use aws_sdk_route53::types::{
    Change, ChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType,
};
use dyndns_core::config::{ProviderConfig, RecordSet, RecordType};
use dyndns_core::traits::{DnsProvider, DnsProviderFactory, UpsertOutcome};
use dyndns_core::{Error, ProviderRegistry, Result};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Region requests are signed for when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Route 53 DNS provider
pub struct Route53Provider {
    client: aws_sdk_route53::Client,
    profile: String,
}

impl std::fmt::Debug for Route53Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route53Provider")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl Route53Provider {
    /// Wrap an already configured SDK client
    pub fn from_client(client: aws_sdk_route53::Client, profile: impl Into<String>) -> Self {
        Self {
            client,
            profile: profile.into(),
        }
    }

    /// Build a provider using a profile from a shared credentials file
    ///
    /// # Parameters
    ///
    /// - `profile`: Profile name in the credentials file
    /// - `credentials_file`: Path to the file; `~/.aws/credentials` when `None`
    /// - `region`: Signing region; [`DEFAULT_REGION`] when `None`
    pub async fn from_profile(
        profile: &str,
        credentials_file: Option<&Path>,
        region: Option<&str>,
    ) -> Result<Self> {
        let credentials_file = match credentials_file {
            Some(path) => expand_tilde(path)?,
            None => default_credentials_file()?,
        };

        if !credentials_file.exists() {
            return Err(Error::config(format!(
                "credentials file not found: {}",
                credentials_file.display()
            )));
        }

        tracing::debug!(
            "Loading Route 53 credentials from {} (profile {})",
            credentials_file.display(),
            profile
        );

        let profile_files = ProfileFiles::builder()
            .with_file(ProfileFileKind::Credentials, &credentials_file)
            .build();

        let credentials = ProfileFileCredentialsProvider::builder()
            .profile_files(profile_files)
            .profile_name(profile)
            .build();

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.unwrap_or(DEFAULT_REGION).to_string()))
            .credentials_provider(credentials)
            .load()
            .await;

        Ok(Self::from_client(
            aws_sdk_route53::Client::new(&sdk_config),
            profile,
        ))
    }
}

/// `~/.aws/credentials`
fn default_credentials_file() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::config("cannot determine home directory for ~/.aws/credentials"))?;
    Ok(home.join(".aws").join("credentials"))
}

/// Expand a leading `~/` to the home directory
fn expand_tilde(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| Error::config(format!("cannot expand {}", path.display())))?;
            Ok(home.join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}

fn rr_type(record_type: RecordType) -> RrType {
    match record_type {
        RecordType::A => RrType::A,
        RecordType::Aaaa => RrType::Aaaa,
    }
}

fn build_error(e: aws_sdk_route53::error::BuildError) -> Error {
    Error::provider("route53", format!("invalid change request: {}", e))
}

/// Build the single-change UPSERT batch for a record set
pub fn build_change_batch(record: &RecordSet, ip: IpAddr, comment: &str) -> Result<ChangeBatch> {
    let resource_record = ResourceRecord::builder()
        .value(ip.to_string())
        .build()
        .map_err(build_error)?;

    let record_set = ResourceRecordSet::builder()
        .name(record.name.as_str())
        .r#type(rr_type(record.record_type))
        .ttl(record.ttl)
        .resource_records(resource_record)
        .build()
        .map_err(build_error)?;

    let change = Change::builder()
        .action(ChangeAction::Upsert)
        .resource_record_set(record_set)
        .build()
        .map_err(build_error)?;

    let mut batch = ChangeBatch::builder().changes(change);
    if !comment.is_empty() {
        batch = batch.comment(comment);
    }
    batch.build().map_err(build_error)
}

/// Map a Route 53 error code onto the shared error kinds
fn classify_error(code: Option<&str>, message: String) -> Error {
    match code {
        Some("NoSuchHostedZone") => Error::not_found(message),
        Some(
            "AccessDenied"
            | "InvalidClientTokenId"
            | "SignatureDoesNotMatch"
            | "UnrecognizedClientException"
            | "ExpiredToken",
        ) => Error::auth(message),
        Some("Throttling" | "PriorRequestNotComplete") => Error::rate_limited(message),
        _ => Error::provider("route53", message),
    }
}

fn map_sdk_error(err: SdkError<ChangeResourceRecordSetsError>) -> Error {
    let message = DisplayErrorContext(&err).to_string();
    classify_error(err.code(), message)
}

#[async_trait]
impl DnsProvider for Route53Provider {
    async fn upsert_record(
        &self,
        record: &RecordSet,
        ip: IpAddr,
        comment: &str,
    ) -> Result<UpsertOutcome> {
        let zone_id = record.require_zone_id()?;
        let batch = build_change_batch(record, ip, comment)?;

        tracing::debug!(
            "ChangeResourceRecordSets zone={} UPSERT {} {} {} ttl={}",
            zone_id,
            record.name,
            record.record_type,
            ip,
            record.ttl
        );

        let output = self
            .client
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let outcome = match output.change_info() {
            Some(info) => UpsertOutcome {
                change_id: Some(info.id().to_string()),
                status: info.status().as_str().to_string(),
                previous_ip: None,
            },
            None => UpsertOutcome::with_status("SUBMITTED"),
        };

        Ok(outcome)
    }

    fn supports_record(&self, record: &RecordSet) -> bool {
        record.zone_id.as_deref().is_some_and(|zone| !zone.is_empty())
    }

    fn provider_name(&self) -> &'static str {
        "route53"
    }
}

/// Factory for creating Route 53 providers
pub struct Route53Factory;

#[async_trait]
impl DnsProviderFactory for Route53Factory {
    async fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Route53 {
                profile,
                credentials_file,
                region,
            } => Ok(Box::new(
                Route53Provider::from_profile(
                    profile,
                    credentials_file.as_deref(),
                    region.as_deref(),
                )
                .await?,
            )),
            _ => Err(Error::config("Invalid config for Route 53 provider")),
        }
    }
}

/// Register the Route 53 provider with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider("route53", Box::new(Route53Factory));
}
