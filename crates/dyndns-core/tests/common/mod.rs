//! Test doubles shared by the engine contract tests
//!
//! Each double counts its calls so tests can assert what the engine did
//! and, just as often, what it did not do.

#![allow(dead_code)]

use dyndns_core::config::{DdnsConfig, ProviderConfig, RecordSet, RecordType};
use dyndns_core::error::{Error, Result};
use dyndns_core::traits::{AddressResolver, DnsProvider, IpSource, UpsertOutcome};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// An IpSource returning a fixed address, or failing
pub struct StaticIpSource {
    ip: Option<IpAddr>,
    calls: Arc<AtomicUsize>,
}

impl StaticIpSource {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip: Some(ip),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            ip: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait::async_trait]
impl IpSource for StaticIpSource {
    async fn current(&self) -> Result<IpAddr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ip
            .ok_or_else(|| Error::provider("http", "Request failed: connection refused"))
    }
}

/// A resolver returning fixed answers and counting lookups
#[derive(Clone)]
pub struct StaticResolver {
    answer: Option<Vec<IpAddr>>,
    lookups: Arc<AtomicUsize>,
}

impl StaticResolver {
    pub fn resolving_to(ips: &[IpAddr]) -> Self {
        Self {
            answer: Some(ips.to_vec()),
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Behaves like NXDOMAIN
    pub fn nxdomain() -> Self {
        Self {
            answer: None,
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AddressResolver for StaticResolver {
    async fn lookup(&self, domain: &str) -> Result<Vec<IpAddr>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.answer
            .clone()
            .ok_or_else(|| Error::resolve(format!("{}: no such host", domain)))
    }
}

/// A recorded upsert call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertCall {
    pub name: String,
    pub record_type: RecordType,
    pub ttl: i64,
    pub zone_id: Option<String>,
    pub ip: IpAddr,
    pub comment: String,
}

/// A DnsProvider recording every upsert
#[derive(Clone)]
pub struct MockDnsProvider {
    calls: Arc<Mutex<Vec<UpsertCall>>>,
    fail_with: Option<String>,
    supports: bool,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_with: None,
            supports: true,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new()
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supports: false,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<UpsertCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn upsert_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn upsert_record(
        &self,
        record: &RecordSet,
        ip: IpAddr,
        comment: &str,
    ) -> Result<UpsertOutcome> {
        self.calls.lock().unwrap().push(UpsertCall {
            name: record.name.clone(),
            record_type: record.record_type,
            ttl: record.ttl,
            zone_id: record.zone_id.clone(),
            ip,
            comment: comment.to_string(),
        });

        if let Some(message) = &self.fail_with {
            return Err(Error::provider("mock", message.clone()));
        }

        Ok(UpsertOutcome {
            change_id: Some("/change/C0001".to_string()),
            status: "PENDING".to_string(),
            previous_ip: None,
        })
    }

    fn supports_record(&self, _record: &RecordSet) -> bool {
        self.supports
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

pub fn addr(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// A valid Route 53 style config for `home.example.com.`
pub fn minimal_config(record_type: RecordType) -> DdnsConfig {
    let record = RecordSet::new("home.example.com.", record_type)
        .with_ttl(300)
        .with_zone_id("Z0123456789ABC");
    DdnsConfig::new(record, ProviderConfig::route53())
}
