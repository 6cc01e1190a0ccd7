use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::geo::Coordinates;

pub type ShipmentId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    ReadyForPickup,
    OutForDelivery,
    Delivered,
    FailedAttempt,
    ReturnedToSender,
    Lost,
    Damaged,
}

impl ShipmentStatus {
    pub const ALL: [ShipmentStatus; 7] = [
        ShipmentStatus::ReadyForPickup,
        ShipmentStatus::OutForDelivery,
        ShipmentStatus::Delivered,
        ShipmentStatus::FailedAttempt,
        ShipmentStatus::ReturnedToSender,
        ShipmentStatus::Lost,
        ShipmentStatus::Damaged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::ReadyForPickup => "ready_for_pickup",
            ShipmentStatus::OutForDelivery => "out_for_delivery",
            ShipmentStatus::Delivered => "delivered",
            ShipmentStatus::FailedAttempt => "failed_attempt",
            ShipmentStatus::ReturnedToSender => "returned_to_sender",
            ShipmentStatus::Lost => "lost",
            ShipmentStatus::Damaged => "damaged",
        }
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown shipment status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ShipmentStatus {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ShipmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == raw)
            .ok_or_else(|| UnknownStatus(raw.to_string()))
    }
}

/// Structured, human-entered address as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub street_number: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postcode: String,
}

impl Location {
    pub fn city(city: &str) -> Self {
        Self {
            city: city.to_string(),
            ..Self::default()
        }
    }

    /// Geocoder query text: `"<street> <number>, <city>, <postcode>"`, blank parts skipped.
    pub fn query(&self) -> String {
        let street_line = [self.street.trim(), self.street_number.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        [street_line.as_str(), self.city.trim(), self.postcode.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn is_blank(&self) -> bool {
        self.query().is_empty()
    }
}

/// Canonical address text and the coordinates it resolved to. Cached on the
/// shipment at write time and never recomputed on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    pub address: String,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PackageAttributes {
    pub weight: f64,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub fragile: bool,
}

impl PackageAttributes {
    pub fn validate(&self) -> Result<(), String> {
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err("weight must be a positive number".to_string());
        }

        for (name, value) in [
            ("length", self.length),
            ("width", self.width),
            ("height", self.height),
        ] {
            if let Some(value) = value {
                if !value.is_finite() || value <= 0.0 {
                    return Err(format!("{name} must be a positive number"));
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub sender_id: Uuid,
    pub recipient_id: Option<Uuid>,
    pub recipient_email: Option<String>,
    pub courier_id: Option<Uuid>,
    pub status: ShipmentStatus,
    pub origin: ResolvedAddress,
    pub destination: ResolvedAddress,
    pub package: PackageAttributes,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewShipment {
    pub origin: Location,
    pub destination: Location,
    #[serde(default)]
    pub recipient_email: Option<String>,
    #[serde(default)]
    pub recipient_id: Option<Uuid>,
    #[serde(flatten)]
    pub package: PackageAttributes,
}

/// Admin replacement of a shipment. Omitted locations keep their cached
/// resolution; recipient and package fields are replaced as given.
#[derive(Debug, Clone, Deserialize)]
pub struct ShipmentUpdate {
    #[serde(default)]
    pub origin: Option<Location>,
    #[serde(default)]
    pub destination: Option<Location>,
    #[serde(default)]
    pub recipient_email: Option<String>,
    #[serde(default)]
    pub recipient_id: Option<Uuid>,
    #[serde(flatten)]
    pub package: PackageAttributes,
}

/// Fully resolved record handed to storage on creation. Storage assigns the
/// id, timestamps and the initial status.
#[derive(Debug, Clone)]
pub struct ShipmentDraft {
    pub sender_id: Uuid,
    pub recipient_id: Option<Uuid>,
    pub recipient_email: Option<String>,
    pub origin: ResolvedAddress,
    pub destination: ResolvedAddress,
    pub package: PackageAttributes,
}

/// Fields an admin replacement overwrites. Sender, courier and status are
/// never part of it.
#[derive(Debug, Clone)]
pub struct ShipmentReplacement {
    pub recipient_id: Option<Uuid>,
    pub recipient_email: Option<String>,
    pub origin: ResolvedAddress,
    pub destination: ResolvedAddress,
    pub package: PackageAttributes,
}

/// Blank emails count as absent.
pub fn normalize_email(raw: Option<String>) -> Result<Option<String>, String> {
    match raw.map(|email| email.trim().to_string()) {
        None => Ok(None),
        Some(email) if email.is_empty() => Ok(None),
        Some(email) => {
            let valid = email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
            if valid {
                Ok(Some(email))
            } else {
                Err(format!("invalid recipient email: {email}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_wire_name() {
        for status in ShipmentStatus::ALL {
            assert_eq!(status.as_str().parse::<ShipmentStatus>(), Ok(status));
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.as_str());
        }
        assert!("pending".parse::<ShipmentStatus>().is_err());
    }

    #[test]
    fn location_query_skips_blank_parts() {
        let full = Location {
            street: "Krakowska".to_string(),
            street_number: "1".to_string(),
            city: "Warszawa".to_string(),
            postcode: "00-001".to_string(),
        };
        assert_eq!(full.query(), "Krakowska 1, Warszawa, 00-001");
        assert_eq!(Location::city("Olsztyn").query(), "Olsztyn");
        assert!(Location::default().is_blank());
    }

    #[test]
    fn package_requires_positive_weight_and_dimensions() {
        let mut package = PackageAttributes {
            weight: 2.5,
            ..PackageAttributes::default()
        };
        assert!(package.validate().is_ok());

        package.height = Some(0.0);
        assert!(package.validate().is_err());

        package.height = None;
        package.weight = -1.0;
        assert!(package.validate().is_err());
    }

    #[test]
    fn blank_email_is_treated_as_absent() {
        assert_eq!(normalize_email(Some("  ".to_string())), Ok(None));
        assert_eq!(normalize_email(None), Ok(None));
        assert_eq!(
            normalize_email(Some(" jan@example.com ".to_string())),
            Ok(Some("jan@example.com".to_string()))
        );
        assert!(normalize_email(Some("not-an-email".to_string())).is_err());
    }

    #[test]
    fn new_shipment_accepts_flat_package_fields() {
        let payload = serde_json::json!({
            "origin": { "street": "Krakowska", "street_number": "1", "city": "Warszawa", "postcode": "00-001" },
            "destination": { "city": "Olsztyn" },
            "recipient_email": "jan@example.com",
            "weight": 3.0,
            "fragile": true
        });
        let shipment: NewShipment = serde_json::from_value(payload).unwrap();
        assert_eq!(shipment.package.weight, 3.0);
        assert!(shipment.package.fragile);
        assert_eq!(shipment.destination.city, "Olsztyn");
    }
}
