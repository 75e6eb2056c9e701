// # Cloudflare DNS Provider
//
// Upserts an A or AAAA record through the Cloudflare API v4.
//
// ## Flow
//
// Cloudflare has no native upsert, so one `upsert_record()` call is:
//
// 1. Zone: the record's zone id if set, otherwise `GET /zones?name=` for each
//    parent of the record name until one matches
// 2. `GET /zones/:zone/dns_records?name=&type=`
// 3. Existing record with the same content: nothing is written (`UNCHANGED`)
// 4. Existing record: `PUT /zones/:zone/dns_records/:id` (`UPDATED`)
// 5. No record: `POST /zones/:zone/dns_records` (`CREATED`)
//
// ## Security
//
// The API token needs `Zone:DNS:Edit` (and `Zone:Read` for zone lookup by
// name). It never appears in logs, errors or `Debug` output.
//
// ## API Reference
//
// - https://developers.cloudflare.com/api/resources/dns/subresources/records/

use async_trait::async_trait;
use dyndns_core::config::{ProviderConfig, RecordSet};
use dyndns_core::traits::{DnsProvider, DnsProviderFactory, UpsertOutcome};
use dyndns_core::{Error, ProviderRegistry, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Envelope around every API v4 response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct DnsRecordBody<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: String,
    ttl: i64,
    comment: &'a str,
}

/// Cloudflare DNS provider
pub struct CloudflareProvider {
    api_token: String,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a provider talking to the public API
    ///
    /// Fails if the token is empty.
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_token, CLOUDFLARE_API_BASE)
    }

    /// Create a provider against another API base URL
    pub fn with_base_url(api_token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(concat!("dyndns53/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Send a request and decode the API envelope
    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("{}: request failed: {}", what, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, what, &body));
        }

        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            Error::provider("cloudflare", format!("{}: invalid response: {}", what, e))
        })?;

        if !envelope.success {
            return Err(Error::provider(
                "cloudflare",
                format!("{}: {}", what, describe_errors(&envelope.errors)),
            ));
        }

        envelope
            .result
            .ok_or_else(|| Error::provider("cloudflare", format!("{}: response has no result", what)))
    }

    /// Find the zone holding `domain`, most specific parent first
    async fn find_zone_id(&self, domain: &str) -> Result<String> {
        for candidate in zone_candidates(domain) {
            tracing::debug!("Looking up Cloudflare zone {}", candidate);

            let zones: Vec<Zone> = self
                .call(
                    self.client
                        .get(format!("{}/zones", self.base_url))
                        .query(&[("name", candidate)]),
                    "zone lookup",
                )
                .await?;

            if let Some(zone) = zones.into_iter().find(|z| z.name == candidate) {
                tracing::debug!("Found zone {} ({})", zone.name, zone.id);
                return Ok(zone.id);
            }
        }

        Err(Error::not_found(format!("no Cloudflare zone contains {}", domain)))
    }

    async fn find_record(&self, zone_id: &str, record: &RecordSet) -> Result<Option<DnsRecord>> {
        let records: Vec<DnsRecord> = self
            .call(
                self.client
                    .get(format!("{}/zones/{}/dns_records", self.base_url, zone_id))
                    .query(&[
                        ("name", record.domain()),
                        ("type", record.record_type.as_str()),
                    ]),
                "record lookup",
            )
            .await?;

        Ok(records.into_iter().next())
    }
}

/// `home.example.com` → `["home.example.com", "example.com"]`
fn zone_candidates(domain: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    let mut rest = domain;
    while rest.contains('.') {
        candidates.push(rest);
        match rest.split_once('.') {
            Some((_, parent)) => rest = parent,
            None => break,
        }
    }
    candidates
}

fn describe_errors(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "request unsuccessful".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{} (code {})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Map a non-success HTTP status to an error
fn status_error(status: StatusCode, what: &str, body: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid API token or insufficient permissions ({})",
            what, status
        )),
        404 => Error::not_found(format!("{}: not found ({})", what, status)),
        409 => Error::provider(
            "cloudflare",
            format!("{}: conflicting record ({}): {}", what, status, body),
        ),
        429 => Error::rate_limited(format!("{}: rate limit exceeded ({})", what, status)),
        500..=599 => Error::provider(
            "cloudflare",
            format!("{}: server error (transient) {}: {}", what, status, body),
        ),
        _ => Error::provider("cloudflare", format!("{}: {}: {}", what, status, body)),
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn upsert_record(
        &self,
        record: &RecordSet,
        ip: IpAddr,
        comment: &str,
    ) -> Result<UpsertOutcome> {
        let zone_id = match record.zone_id.as_deref() {
            Some(zone) if !zone.is_empty() => zone.to_string(),
            _ => self.find_zone_id(record.domain()).await?,
        };

        let body = DnsRecordBody {
            record_type: record.record_type.as_str(),
            name: record.domain(),
            content: ip.to_string(),
            ttl: record.ttl,
            comment,
        };

        match self.find_record(&zone_id, record).await? {
            Some(existing) => {
                let previous_ip = existing.content.parse::<IpAddr>().ok();
                if previous_ip == Some(ip) {
                    tracing::info!("Cloudflare record {} already holds {}", record.domain(), ip);
                    return Ok(UpsertOutcome {
                        change_id: Some(existing.id),
                        status: "UNCHANGED".to_string(),
                        previous_ip,
                    });
                }

                tracing::debug!(
                    "PUT record {} in zone {}: {} -> {}",
                    existing.id,
                    zone_id,
                    existing.content,
                    ip
                );
                let updated: DnsRecord = self
                    .call(
                        self.client
                            .put(format!(
                                "{}/zones/{}/dns_records/{}",
                                self.base_url, zone_id, existing.id
                            ))
                            .json(&body),
                        "record update",
                    )
                    .await?;

                Ok(UpsertOutcome {
                    change_id: Some(updated.id),
                    status: "UPDATED".to_string(),
                    previous_ip,
                })
            }
            None => {
                tracing::debug!("POST new record {} in zone {}", record.domain(), zone_id);
                let created: DnsRecord = self
                    .call(
                        self.client
                            .post(format!("{}/zones/{}/dns_records", self.base_url, zone_id))
                            .json(&body),
                        "record create",
                    )
                    .await?;

                Ok(UpsertOutcome {
                    change_id: Some(created.id),
                    status: "CREATED".to_string(),
                    previous_ip: None,
                })
            }
        }
    }

    fn supports_record(&self, record: &RecordSet) -> bool {
        record.domain().contains('.')
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

#[async_trait]
impl DnsProviderFactory for CloudflareFactory {
    async fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare { api_token } => {
                Ok(Box::new(CloudflareProvider::new(api_token.clone())?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider("cloudflare", Box::new(CloudflareFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use dyndns_core::config::RecordType;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Requests seen by the mock API, as "METHOD /path?query" plus body
    type Seen = Arc<Mutex<Vec<(String, String)>>>;

    async fn read_request(socket: &mut TcpStream) -> (String, String) {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            data.extend_from_slice(&buf[..n]);
            if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&data[..header_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);

        while data.len() < header_end + content_length {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before body");
            data.extend_from_slice(&buf[..n]);
        }

        let request_line = head.lines().next().unwrap_or_default();
        let mut parts = request_line.split_whitespace();
        let line = format!(
            "{} {}",
            parts.next().unwrap_or_default(),
            parts.next().unwrap_or_default()
        );
        let body = String::from_utf8_lossy(&data[header_end..header_end + content_length]).to_string();
        (line, body)
    }

    /// Serve canned responses in order, one per connection
    async fn mock_api(responses: Vec<(u16, &'static str)>) -> (String, Seen) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen: Seen = Arc::default();
        let log = seen.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                log.lock().unwrap().push(request);

                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}", addr), seen)
    }

    fn record() -> RecordSet {
        RecordSet::new("home.example.com.", RecordType::A)
            .with_ttl(120)
            .with_zone_id("zone1")
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    const EXISTING: &str =
        r#"{"success":true,"errors":[],"result":[{"id":"rec1","content":"198.51.100.1"}]}"#;
    const NONE: &str = r#"{"success":true,"errors":[],"result":[]}"#;
    const WRITTEN: &str =
        r#"{"success":true,"errors":[],"result":{"id":"rec1","content":"203.0.113.7"}}"#;

    #[test]
    fn zone_candidates_walk_parents() {
        assert_eq!(
            zone_candidates("home.example.com"),
            vec!["home.example.com", "example.com"]
        );
        assert_eq!(zone_candidates("example.com"), vec!["example.com"]);
        assert!(zone_candidates("localhost").is_empty());
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "x", ""),
            Error::Authentication(_)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "x", ""),
            Error::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "x", ""),
            Error::RateLimited(_)
        ));
        assert!(matches!(
            status_error(StatusCode::CONFLICT, "x", ""),
            Error::Provider { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "x", ""),
            Error::Provider { .. }
        ));
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(matches!(CloudflareProvider::new(""), Err(Error::Config(_))));
    }

    #[test]
    fn debug_redacts_token() {
        let provider = CloudflareProvider::new("secret-token-value").unwrap();
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("secret-token-value"));
        assert!(debug.contains("<REDACTED>"));
    }

    #[tokio::test]
    async fn existing_record_is_updated() {
        let (base, seen) = mock_api(vec![(200, EXISTING), (200, WRITTEN)]).await;
        let provider = CloudflareProvider::with_base_url("token", base).unwrap();

        let outcome = provider
            .upsert_record(&record(), ip("203.0.113.7"), "dyndns53")
            .await
            .unwrap();

        assert_eq!(outcome.status, "UPDATED");
        assert_eq!(outcome.change_id.as_deref(), Some("rec1"));
        assert_eq!(outcome.previous_ip, Some(ip("198.51.100.1")));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[0].0,
            "GET /zones/zone1/dns_records?name=home.example.com&type=A"
        );
        assert_eq!(seen[1].0, "PUT /zones/zone1/dns_records/rec1");

        let body: serde_json::Value = serde_json::from_str(&seen[1].1).unwrap();
        assert_eq!(body["content"], "203.0.113.7");
        assert_eq!(body["type"], "A");
        assert_eq!(body["ttl"], 120);
        assert_eq!(body["name"], "home.example.com");
    }

    #[tokio::test]
    async fn missing_record_is_created() {
        let created = r#"{"success":true,"errors":[],"result":{"id":"new1","content":"203.0.113.7"}}"#;
        let (base, seen) = mock_api(vec![(200, NONE), (200, created)]).await;
        let provider = CloudflareProvider::with_base_url("token", base).unwrap();

        let outcome = provider
            .upsert_record(&record(), ip("203.0.113.7"), "dyndns53")
            .await
            .unwrap();

        assert_eq!(outcome.status, "CREATED");
        assert_eq!(outcome.change_id.as_deref(), Some("new1"));
        assert_eq!(outcome.previous_ip, None);
        assert_eq!(seen.lock().unwrap()[1].0, "POST /zones/zone1/dns_records");
    }

    #[tokio::test]
    async fn matching_record_is_left_alone() {
        let same = r#"{"success":true,"errors":[],"result":[{"id":"rec1","content":"203.0.113.7"}]}"#;
        let (base, seen) = mock_api(vec![(200, same)]).await;
        let provider = CloudflareProvider::with_base_url("token", base).unwrap();

        let outcome = provider
            .upsert_record(&record(), ip("203.0.113.7"), "dyndns53")
            .await
            .unwrap();

        assert_eq!(outcome.status, "UNCHANGED");
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn zone_is_found_by_parent_name() {
        let zone = r#"{"success":true,"errors":[],"result":[{"id":"zone9","name":"example.com"}]}"#;
        let (base, seen) = mock_api(vec![(200, NONE), (200, zone), (200, EXISTING), (200, WRITTEN)]).await;
        let provider = CloudflareProvider::with_base_url("token", base).unwrap();

        let record = RecordSet::new("home.example.com.", RecordType::A);
        provider
            .upsert_record(&record, ip("203.0.113.7"), "dyndns53")
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, "GET /zones?name=home.example.com");
        assert_eq!(seen[1].0, "GET /zones?name=example.com");
        assert!(seen[2].0.starts_with("GET /zones/zone9/dns_records"));
        assert_eq!(seen[3].0, "PUT /zones/zone9/dns_records/rec1");
    }

    #[tokio::test]
    async fn forbidden_is_authentication_error() {
        let (base, _) = mock_api(vec![(403, r#"{"success":false}"#)]).await;
        let provider = CloudflareProvider::with_base_url("token", base).unwrap();

        let err = provider
            .upsert_record(&record(), ip("203.0.113.7"), "dyndns53")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[tokio::test]
    async fn unsuccessful_envelope_reports_api_errors() {
        let failed = r#"{"success":false,"errors":[{"code":9005,"message":"Content for A record is invalid"}],"result":null}"#;
        let (base, _) = mock_api(vec![(200, EXISTING), (200, failed)]).await;
        let provider = CloudflareProvider::with_base_url("token", base).unwrap();

        let err = provider
            .upsert_record(&record(), ip("203.0.113.7"), "dyndns53")
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Content for A record is invalid"));
        assert!(message.contains("9005"));
    }

    #[test]
    fn register_adds_cloudflare() {
        let registry = ProviderRegistry::new();
        register(&registry);
        assert!(registry.has_provider("cloudflare"));
    }
}
