use std::env;
use std::str::FromStr;
use std::time::Duration;

use uuid::Uuid;

use crate::error::AppError;
use crate::geo::nominatim::DEFAULT_USER_AGENT;
use crate::models::actor::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected compact or json, got {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeocoderKind {
    Nominatim,
    Gazetteer,
}

impl FromStr for GeocoderKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "nominatim" => Ok(GeocoderKind::Nominatim),
            "gazetteer" => Ok(GeocoderKind::Gazetteer),
            other => Err(format!("expected nominatim or gazetteer, got {other}")),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Absent means in-memory storage.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub database_timeout: Duration,
    pub geocoder: GeocoderKind,
    pub geocoder_url: String,
    pub geocoder_timeout: Duration,
    pub geocoder_max_concurrency: usize,
    pub geocoder_user_agent: String,
    pub event_buffer_size: usize,
    /// Shared secret every bearer token must carry.
    pub auth_secret: String,
    /// Users registered in the in-memory directory at startup.
    pub directory_users: Vec<(Role, Uuid)>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_or_default("LOG_FORMAT", LogFormat::Compact)?,
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            database_max_connections: parse_or_default("DATABASE_MAX_CONNECTIONS", 10)?,
            database_timeout: Duration::from_millis(parse_or_default("DATABASE_TIMEOUT_MS", 5000)?),
            geocoder: parse_or_default("GEOCODER", GeocoderKind::Nominatim)?,
            geocoder_url: env::var("GEOCODER_URL")
                .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string()),
            geocoder_timeout: Duration::from_millis(parse_or_default("GEOCODER_TIMEOUT_MS", 1500)?),
            geocoder_max_concurrency: parse_or_default("GEOCODER_MAX_CONCURRENCY", 1)?,
            geocoder_user_agent: env::var("GEOCODER_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            auth_secret: env::var("AUTH_SECRET")
                .ok()
                .filter(|secret| !secret.trim().is_empty())
                .ok_or_else(|| AppError::Internal("AUTH_SECRET must be set".to_string()))?,
            directory_users: parse_directory_users(
                &env::var("DIRECTORY_USERS").unwrap_or_default(),
            )
            .map_err(|err| AppError::Internal(format!("invalid DIRECTORY_USERS: {err}")))?,
        })
    }
}

/// Parses `role:uuid` pairs separated by commas.
pub fn parse_directory_users(raw: &str) -> Result<Vec<(Role, Uuid)>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> Result<(Role, Uuid), String> {
            let (role, id) = entry
                .split_once(':')
                .ok_or_else(|| format!("expected role:uuid, got {entry}"))?;
            let role = role.trim().parse::<Role>()?;
            let id = id
                .trim()
                .parse::<Uuid>()
                .map_err(|err| format!("{entry}: {err}"))?;
            Ok((role, id))
        })
        .collect()
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
