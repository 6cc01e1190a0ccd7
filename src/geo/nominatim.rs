//! Reqwest-backed Nominatim geocoder.
//!
//! Owns transport details only: URL building, identity headers, timeout and
//! HTTP error mapping, and JSON decoding into resolved addresses.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::geo::resolver::{GeocodeError, Geocoder};
use crate::geo::Coordinates;
use crate::models::shipment::ResolvedAddress;

pub const DEFAULT_USER_AGENT: &str = "shipment-tracker/0.1";

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct ReverseHit {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct NominatimGeocoder {
    client: Client,
    base_url: Url,
}

impl NominatimGeocoder {
    pub fn new(base_url: Url, timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, name: &str) -> Result<Url, GeocodeError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                GeocodeError::InvalidRequest(format!(
                    "geocoder base url cannot be a base: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }

    async fn get_json(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<Vec<u8>, GeocodeError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    fn kind(&self) -> &'static str {
        "nominatim"
    }

    async fn geocode(&self, query: &str) -> Result<ResolvedAddress, GeocodeError> {
        let url = self.endpoint("search")?;
        let body = self
            .get_json(
                url,
                &[
                    ("q", query.to_string()),
                    ("format", "jsonv2".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        let hits: Vec<SearchHit> = serde_json::from_slice(&body)
            .map_err(|err| GeocodeError::Decode(format!("invalid search payload: {err}")))?;
        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::AddressNotFound(query.to_string()))?;

        Ok(ResolvedAddress {
            coordinates: Coordinates::new(parse_degrees(&hit.lat)?, parse_degrees(&hit.lon)?),
            address: hit.display_name,
        })
    }

    async fn reverse(&self, at: Coordinates) -> Result<String, GeocodeError> {
        let url = self.endpoint("reverse")?;
        let body = self
            .get_json(
                url,
                &[
                    ("lat", at.lat.to_string()),
                    ("lon", at.lon.to_string()),
                    ("format", "jsonv2".to_string()),
                ],
            )
            .await?;

        let hit: ReverseHit = serde_json::from_slice(&body)
            .map_err(|err| GeocodeError::Decode(format!("invalid reverse payload: {err}")))?;
        match (hit.display_name, hit.error) {
            (Some(address), None) => Ok(address),
            _ => Err(GeocodeError::AddressNotFound(format!("({}, {})", at.lat, at.lon))),
        }
    }
}

fn parse_degrees(raw: &str) -> Result<f64, GeocodeError> {
    raw.parse::<f64>()
        .map_err(|err| GeocodeError::Decode(format!("invalid coordinate '{raw}': {err}")))
}

fn map_transport_error(err: reqwest::Error) -> GeocodeError {
    if err.is_timeout() {
        GeocodeError::Timeout
    } else {
        GeocodeError::Upstream(format!("transport error: {err}"))
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> GeocodeError {
    let snippet: String = String::from_utf8_lossy(body).chars().take(200).collect();
    GeocodeError::Upstream(format!("status {status}: {snippet}"))
}
