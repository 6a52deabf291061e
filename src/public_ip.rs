use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use derive_more::Display;
use rootcause::{Report, bail, prelude::ResultExt, report};
use tracing::{debug, warn};

/// Services that answer a plain GET with the caller's public IP as text.
/// They are tried in this order.
pub const ECHO_ENDPOINTS: [&str; 4] = [
    "https://api64.ipify.org",
    "https://api.ipify.org",
    "https://ifconfig.me/ip",
    "https://ipinfo.io/ip",
];

const ECHO_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_ADDRESS_LEN: usize = 64;

/// An IPv4 or IPv6 literal as reported by an echo service.
///
/// Only the character set and length are checked, so this accepts some
/// strings that are not real addresses (e.g. `aaaa`).
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub struct PublicAddress(String);

impl PublicAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PublicAddress {
    type Err = Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.is_empty() {
            bail!("Empty address");
        }
        if s.len() >= MAX_ADDRESS_LEN {
            bail!("Address is too long ({} characters)", s.len());
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_hexdigit() || *c == ':' || *c == '.'))
        {
            bail!("Unexpected character {:?} in '{}'", c, s);
        }

        Ok(Self(s.to_string()))
    }
}

#[async_trait]
pub trait AddressEcho {
    /// Fetches the raw response body of one echo service.
    async fn fetch(&self, url: &str) -> Result<String, Report>;
}

pub struct HttpEcho {
    client: reqwest::Client,
}

impl HttpEcho {
    pub fn new() -> Result<Self, Report> {
        let client = reqwest::Client::builder()
            .timeout(ECHO_TIMEOUT)
            .build()
            .context("Building HTTP client for IP echo services")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AddressEcho for HttpEcho {
    async fn fetch(&self, url: &str) -> Result<String, Report> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Requesting public IP")
            .attach(format!("url: '{url}'"))?;

        if !response.status().is_success() {
            return Err(report!("IP echo service returned an error status")
                .attach(format!("url: '{url}'"))
                .attach(format!("status: {}", response.status())));
        }

        let body = response
            .text()
            .await
            .context("Reading IP echo response")
            .attach(format!("url: '{url}'"))?;

        Ok(body)
    }
}

/// Asks each endpoint in turn and returns the first valid address.
///
/// Endpoints after the first valid answer are never contacted.
pub async fn discover<E>(echo: &E, endpoints: &[&str]) -> Result<PublicAddress, Report>
where
    E: AddressEcho + Sync + ?Sized,
{
    for url in endpoints {
        let body = match echo.fetch(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %url, error = %e, "IP echo service failed, trying the next one");
                continue;
            }
        };

        match body.parse::<PublicAddress>() {
            Ok(address) => {
                debug!(url = %url, ip = %address, "got public IP");
                return Ok(address);
            }
            Err(e) => {
                warn!(url = %url, error = %e, "IP echo service returned garbage, trying the next one");
            }
        }
    }

    Err(report!("Could not determine the public IP from any service")
        .attach(format!("services tried: {}", endpoints.join(", "))))
}
