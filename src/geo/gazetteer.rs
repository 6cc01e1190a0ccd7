//! Offline geocoder backed by a fixed table of places.
//!
//! Used when `GEOCODER=gazetteer`, for local runs without network access and
//! for tests. Lookups match the whole query after case and whitespace folding.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::geo::resolver::{GeocodeError, Geocoder};
use crate::geo::{haversine_km, Coordinates};
use crate::models::shipment::ResolvedAddress;

/// Reverse lookups only answer within this radius of a known place.
const REVERSE_MATCH_RADIUS_KM: f64 = 25.0;

#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    entries: HashMap<String, ResolvedAddress>,
}

impl Gazetteer {
    /// The cities used by the demo data set.
    pub fn polish_cities() -> Self {
        [
            ("Warszawa", "Warszawa, województwo mazowieckie, Polska", 52.2297, 21.0122),
            ("Olsztyn", "Olsztyn, województwo warmińsko-mazurskie, Polska", 53.7784, 20.4801),
            ("Poznan", "Poznań, województwo wielkopolskie, Polska", 52.4064, 16.9252),
            ("Krakow", "Kraków, województwo małopolskie, Polska", 50.0647, 19.9450),
            ("Bialystok", "Białystok, województwo podlaskie, Polska", 53.1325, 23.1688),
            ("Gdansk", "Gdańsk, województwo pomorskie, Polska", 54.3520, 18.6466),
            ("Lodz", "Łódź, województwo łódzkie, Polska", 51.7592, 19.4560),
        ]
        .into_iter()
        .fold(Self::default(), |gazetteer, (query, address, lat, lon)| {
            gazetteer.with_entry(query, address, Coordinates::new(lat, lon))
        })
    }

    pub fn with_entry(mut self, query: &str, address: &str, coordinates: Coordinates) -> Self {
        self.entries.insert(
            normalize(query),
            ResolvedAddress {
                address: address.to_string(),
                coordinates,
            },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[async_trait]
impl Geocoder for Gazetteer {
    fn kind(&self) -> &'static str {
        "gazetteer"
    }

    async fn geocode(&self, query: &str) -> Result<ResolvedAddress, GeocodeError> {
        self.entries
            .get(&normalize(query))
            .cloned()
            .ok_or_else(|| GeocodeError::AddressNotFound(query.to_string()))
    }

    async fn reverse(&self, at: Coordinates) -> Result<String, GeocodeError> {
        self.entries
            .values()
            .map(|entry| (haversine_km(&at, &entry.coordinates), entry))
            .filter(|(distance, _)| *distance <= REVERSE_MATCH_RADIUS_KM)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, entry)| entry.address.clone())
            .ok_or_else(|| GeocodeError::AddressNotFound(format!("({}, {})", at.lat, at.lon)))
    }
}
