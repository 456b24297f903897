//! ipapi.co country lookup.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::{CountryLookup, CountryWithIp, GeoError};

/// Base URL of the public ipapi.co service.
pub const DEFAULT_IP_LOOKUP_URL: &str = "https://ipapi.co/";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct IpApiResponse {
    #[serde(flatten)]
    country: CountryWithIp,
    #[serde(default)]
    error: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// HTTP client for `GET {base}/{ip}/json/`.
#[derive(Debug, Clone)]
pub struct IpApiClient {
    client: Client,
    base_url: Url,
}

impl IpApiClient {
    pub fn new(base_url: &str) -> Result<Self, GeoError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = Client::builder().timeout(LOOKUP_TIMEOUT).build()?;
        Ok(Self { client, base_url })
    }

    /// Lookup URL for an IP. Anything that is not an IP address is refused
    /// so header-supplied values cannot rewrite the request path.
    fn lookup_url(&self, ip: &str) -> Result<Url, GeoError> {
        let ip: IpAddr = ip
            .parse()
            .map_err(|_| GeoError::InvalidIp(ip.to_string()))?;
        Ok(self.base_url.join(&format!("{ip}/json/"))?)
    }
}

#[async_trait]
impl CountryLookup for IpApiClient {
    async fn country_for_ip(&self, ip: &str) -> Result<CountryWithIp, GeoError> {
        let url = self.lookup_url(ip)?;

        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(GeoError::Status(resp.status().as_u16()));
        }

        let body: IpApiResponse = resp.json().await?;
        if body.error {
            return Err(GeoError::Rejected {
                ip: ip.to_string(),
                reason: body.reason.unwrap_or_else(|| "unknown".into()),
            });
        }

        Ok(body.country)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_lookup_url_under_base() {
        let client = IpApiClient::new("https://ipapi.co").unwrap();
        assert_eq!(
            client.lookup_url("8.8.8.8").unwrap().as_str(),
            "https://ipapi.co/8.8.8.8/json/"
        );

        let client = IpApiClient::new("http://geo.internal/api").unwrap();
        assert_eq!(
            client.lookup_url("8.8.4.4").unwrap().as_str(),
            "http://geo.internal/api/8.8.4.4/json/"
        );
    }

    #[test]
    fn refuses_non_ip_input() {
        let client = IpApiClient::new(DEFAULT_IP_LOOKUP_URL).unwrap();
        assert!(matches!(
            client.lookup_url("../admin?x="),
            Err(GeoError::InvalidIp(_))
        ));
    }

    #[test]
    fn error_body_is_detected() {
        let body: IpApiResponse = serde_json::from_str(
            r#"{"ip":"127.0.0.1","error":true,"reason":"Reserved IP Address","reserved":true}"#,
        )
        .unwrap();
        assert!(body.error);
        assert_eq!(body.reason.as_deref(), Some("Reserved IP Address"));
    }

    #[test]
    fn country_body_is_parsed() {
        let body: IpApiResponse = serde_json::from_str(
            r#"{"ip":"31.153.0.1","city":"Nicosia","country_code":"CY","country_name":"Cyprus","currency":"EUR","country_calling_code":"+357"}"#,
        )
        .unwrap();
        assert!(!body.error);
        assert_eq!(body.country.country_name.as_deref(), Some("Cyprus"));
    }
}
