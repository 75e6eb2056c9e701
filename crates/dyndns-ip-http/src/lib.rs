// # HTTP IP Source
//
// Discovers the caller's public IP by asking a "what is my IP" service.
//
// ## Protocol
//
// A single `GET`; the service answers with the address as plain text,
// usually followed by a newline. That is the whole contract, so any service
// behaving like `checkip.amazonaws.com` works:
//
// - `http://checkip.amazonaws.com/` (default)
// - `https://api.ipify.org` (IPv4), `https://api6.ipify.org` (IPv6)
// - `https://icanhazip.com`

use dyndns_core::ProviderRegistry;
use dyndns_core::config::{IpSourceConfig, IpVersion};
use dyndns_core::traits::{IpSource, IpSourceFactory};
use dyndns_core::{Error, Result};

use std::net::IpAddr;
use std::time::Duration;

/// HTTP-based IP source
#[derive(Debug, Clone)]
pub struct HttpIpSource {
    url: String,
    version: IpVersion,
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a new HTTP IP source
    ///
    /// # Parameters
    ///
    /// - `url`: Service URL (e.g., "http://checkip.amazonaws.com/")
    /// - `version`: Address family to accept
    /// - `timeout`: Whole-request timeout
    pub fn new(url: impl Into<String>, version: IpVersion, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dyndns53/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            version,
            client,
        })
    }

    /// The service URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Parse a service response body into an address of the wanted family
///
/// Surrounding whitespace (including the trailing newline most services
/// send) is ignored.
pub fn parse_ip_body(body: &str, version: IpVersion) -> Result<IpAddr> {
    let text = body.trim();

    let ip: IpAddr = text
        .parse()
        .map_err(|_| Error::provider("http", format!("Invalid IP address: {:?}", text)))?;

    match version {
        IpVersion::V4 if !ip.is_ipv4() => Err(Error::provider(
            "http",
            format!("Expected IPv4, got: {}", ip),
        )),
        IpVersion::V6 if !ip.is_ipv6() => Err(Error::provider(
            "http",
            format!("Expected IPv6, got: {}", ip),
        )),
        _ => Ok(ip),
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<IpAddr> {
        tracing::debug!("Fetching public IP from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::provider("http", format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::provider("http", format!("HTTP error: {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::provider("http", format!("Failed to read response: {}", e)))?;

        let ip = parse_ip_body(&body, self.version)?;
        tracing::debug!("{} reported {}", self.url, ip);
        Ok(ip)
    }

    fn version(&self) -> IpVersion {
        self.version
    }
}

/// Factory for creating HTTP IP sources
pub struct HttpFactory;

impl IpSourceFactory for HttpFactory {
    fn create(&self, config: &IpSourceConfig, version: IpVersion) -> Result<Box<dyn IpSource>> {
        match config {
            IpSourceConfig::Http { url, timeout_secs } => Ok(Box::new(HttpIpSource::new(
                url.clone(),
                version,
                Duration::from_secs(*timeout_secs),
            )?)),
            _ => Err(Error::config("Invalid config for HTTP IP source")),
        }
    }
}

/// Register the HTTP IP source with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_ip_source("http", Box::new(HttpFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port and return its URL
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "{}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{}/", addr)
    }

    #[test]
    fn parses_body_with_trailing_newline() {
        let ip = parse_ip_body("203.0.113.7\n", IpVersion::Both).unwrap();
        assert_eq!(ip, "203.0.113.7".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn parses_ipv6_body() {
        let ip = parse_ip_body("  2001:db8::7\r\n", IpVersion::V6).unwrap();
        assert!(ip.is_ipv6());
    }

    #[test]
    fn rejects_garbage_body() {
        assert!(parse_ip_body("<html>rate limited</html>", IpVersion::Both).is_err());
        assert!(parse_ip_body("", IpVersion::Both).is_err());
    }

    #[test]
    fn rejects_wrong_family() {
        assert!(parse_ip_body("203.0.113.7", IpVersion::V6).is_err());
        assert!(parse_ip_body("2001:db8::7", IpVersion::V4).is_err());
    }

    #[test]
    fn factory_creates_http_source() {
        let source = HttpFactory.create(&IpSourceConfig::default(), IpVersion::V4);
        assert!(source.is_ok());
        assert_eq!(source.unwrap().version(), IpVersion::V4);
    }

    #[test]
    fn register_adds_http() {
        let registry = ProviderRegistry::new();
        register(&registry);
        assert!(registry.has_ip_source("http"));
    }

    #[tokio::test]
    async fn fetches_ip_from_service() {
        let url = serve_once("HTTP/1.1 200 OK", "203.0.113.7\n").await;
        let source = HttpIpSource::new(url, IpVersion::V4, Duration::from_secs(5)).unwrap();

        let ip = source.current().await.unwrap();
        assert_eq!(ip, "203.0.113.7".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let url = serve_once("HTTP/1.1 503 Service Unavailable", "busy").await;
        let source = HttpIpSource::new(url, IpVersion::Both, Duration::from_secs(5)).unwrap();

        let err = source.current().await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
