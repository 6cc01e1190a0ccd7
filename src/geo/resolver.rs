//! Address resolution on top of a pluggable geocoding provider.
//!
//! The provider is a shared, rate-limited third party. Every call goes through
//! a semaphore sized by `GEOCODER_MAX_CONCURRENCY` and carries its own timeout,
//! separate from any storage timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::geo::Coordinates;
use crate::models::shipment::{Location, ResolvedAddress};
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocodeError {
    #[error("no match for '{0}'")]
    AddressNotFound(String),

    #[error("geocoding request timed out")]
    Timeout,

    #[error("invalid geocoding request: {0}")]
    InvalidRequest(String),

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("undecodable response: {0}")]
    Decode(String),
}

impl GeocodeError {
    fn outcome(&self) -> &'static str {
        match self {
            GeocodeError::AddressNotFound(_) => "not_found",
            GeocodeError::Timeout => "timeout",
            GeocodeError::InvalidRequest(_) => "invalid",
            GeocodeError::Upstream(_) | GeocodeError::Decode(_) => "upstream_error",
        }
    }
}

/// Outbound geocoding provider.
#[async_trait]
pub trait Geocoder: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn geocode(&self, query: &str) -> Result<ResolvedAddress, GeocodeError>;

    async fn reverse(&self, at: Coordinates) -> Result<String, GeocodeError>;
}

pub struct AddressResolver {
    geocoder: Arc<dyn Geocoder>,
    permits: Semaphore,
    timeout: Duration,
    metrics: Metrics,
}

impl AddressResolver {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        max_concurrency: usize,
        timeout: Duration,
        metrics: Metrics,
    ) -> Self {
        Self {
            geocoder,
            permits: Semaphore::new(max_concurrency.max(1)),
            timeout,
            metrics,
        }
    }

    pub fn geocoder_kind(&self) -> &'static str {
        self.geocoder.kind()
    }

    /// Geocodes free text to coordinates.
    pub async fn resolve(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        self.lookup(address).await.map(|resolved| resolved.coordinates)
    }

    /// Composes a structured address into one query and returns the canonical
    /// formatted address together with its coordinates.
    pub async fn resolve_structured(
        &self,
        location: &Location,
    ) -> Result<ResolvedAddress, GeocodeError> {
        self.lookup(&location.query()).await
    }

    /// Best-effort reverse geocode, used for diagnostics only.
    pub async fn reverse_resolve(&self, at: Coordinates) -> Result<String, GeocodeError> {
        if !at.is_valid() {
            return Err(GeocodeError::InvalidRequest(format!(
                "coordinates out of range: ({}, {})",
                at.lat, at.lon
            )));
        }

        self.throttled("reverse", self.geocoder.reverse(at)).await
    }

    async fn lookup(&self, query: &str) -> Result<ResolvedAddress, GeocodeError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(GeocodeError::InvalidRequest(
                "address must not be empty".to_string(),
            ));
        }

        let resolved = self
            .throttled("forward", self.geocoder.geocode(query))
            .await?;

        if !resolved.coordinates.is_valid() {
            return Err(GeocodeError::Decode(format!(
                "provider returned out-of-range coordinates for '{query}'"
            )));
        }

        debug!(
            query,
            address = %resolved.address,
            lat = resolved.coordinates.lat,
            lon = resolved.coordinates.lon,
            "address resolved"
        );
        Ok(resolved)
    }

    async fn throttled<T, F>(&self, direction: &'static str, call: F) -> Result<T, GeocodeError>
    where
        F: std::future::Future<Output = Result<T, GeocodeError>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|err| GeocodeError::Upstream(format!("geocoder throttle closed: {err}")))?;

        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GeocodeError::Timeout),
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(err) => err.outcome(),
        };
        self.metrics
            .geocode_latency_seconds
            .with_label_values(&[direction, outcome])
            .observe(start.elapsed().as_secs_f64());

        if let Err(err) = &result {
            warn!(direction, error = %err, "geocoding failed");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::geo::gazetteer::Gazetteer;

    struct SlowGeocoder {
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl Geocoder for SlowGeocoder {
        fn kind(&self) -> &'static str {
            "slow"
        }

        async fn geocode(&self, query: &str) -> Result<ResolvedAddress, GeocodeError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(ResolvedAddress {
                address: query.to_string(),
                coordinates: Coordinates::new(52.0, 21.0),
            })
        }

        async fn reverse(&self, _at: Coordinates) -> Result<String, GeocodeError> {
            Ok("somewhere".to_string())
        }
    }

    fn slow(delay: Duration) -> Arc<SlowGeocoder> {
        Arc::new(SlowGeocoder {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn slow_provider_surfaces_as_timeout() {
        let resolver = AddressResolver::new(
            slow(Duration::from_millis(200)),
            1,
            Duration::from_millis(20),
            Metrics::new(),
        );

        let err = resolver.resolve("Warszawa").await.unwrap_err();
        assert_eq!(err, GeocodeError::Timeout);
    }

    #[tokio::test]
    async fn concurrent_lookups_are_serialized_by_the_throttle() {
        let geocoder = slow(Duration::from_millis(10));
        let resolver = Arc::new(AddressResolver::new(
            geocoder.clone(),
            1,
            Duration::from_secs(1),
            Metrics::new(),
        ));

        let tasks: Vec<_> = (0..5)
            .map(|i| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve(&format!("query {i}")).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(geocoder.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn structured_lookup_returns_formatted_address_and_coordinates() {
        let gazetteer = Gazetteer::default().with_entry(
            "Krakowska 1, Warszawa, 00-001",
            "Krakowska 1, 00-001 Warszawa, Polska",
            Coordinates::new(52.2301, 21.0113),
        );
        let resolver =
            AddressResolver::new(Arc::new(gazetteer), 1, Duration::from_secs(1), Metrics::new());

        let location = Location {
            street: "Krakowska".to_string(),
            street_number: "1".to_string(),
            city: "Warszawa".to_string(),
            postcode: "00-001".to_string(),
        };
        let resolved = resolver.resolve_structured(&location).await.unwrap();
        assert_eq!(resolved.address, "Krakowska 1, 00-001 Warszawa, Polska");
        assert_eq!(resolved.coordinates, Coordinates::new(52.2301, 21.0113));
    }

    #[tokio::test]
    async fn blank_address_is_rejected_without_calling_the_provider() {
        let geocoder = slow(Duration::from_millis(1));
        let resolver =
            AddressResolver::new(geocoder.clone(), 1, Duration::from_secs(1), Metrics::new());

        let err = resolver
            .resolve_structured(&Location::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GeocodeError::InvalidRequest(_)));
        assert_eq!(geocoder.max_in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reverse_rejects_out_of_range_coordinates() {
        let resolver = AddressResolver::new(
            Arc::new(Gazetteer::default()),
            1,
            Duration::from_secs(1),
            Metrics::new(),
        );
        let err = resolver
            .reverse_resolve(Coordinates::new(120.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, GeocodeError::InvalidRequest(_)));
    }
}
