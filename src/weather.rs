//!
//! # Weather Lookup
//!
//! Thin client for the OpenWeather API. A city name is geocoded first, then
//! current conditions are fetched for the resulting coordinates. Responses
//! are summarized to the handful of fields the API exposes and cached
//! per city for a fixed window, so repeat lookups within the window replay
//! the exact same body without touching the upstream service.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset};
use lazy_static::lazy_static;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::AppError;

/// How long a cached weather summary stays valid.
pub const CACHE_TTL: Duration = Duration::from_secs(1200);

lazy_static! {
    // Sunrise and sunset are reported in UTC+03:30.
    static ref LOCAL_TZ: FixedOffset = FixedOffset::east_opt(3 * 3600 + 1800).unwrap();
}

#[derive(Debug, Deserialize)]
struct GeoEntry {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct ConditionEntry {
    description: String,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    humidity: i64,
}

#[derive(Debug, Deserialize)]
struct SunTimes {
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct UpstreamWeather {
    weather: Vec<ConditionEntry>,
    main: MainReadings,
    sys: SunTimes,
}

/// Lowercases and trims a city name so that `Berlin`, `berlin` and
/// ` BERLIN ` all share one cache entry.
pub fn normalize_city(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Resolves a city to current conditions via the upstream provider.
///
/// An unknown city, network trouble or an upstream error status all
/// surface as `AppError::Service`.
pub async fn lookup(
    client: &reqwest::Client,
    config: &Config,
    city: &str,
) -> Result<Value, AppError> {
    let geo: Vec<GeoEntry> = client
        .get(&config.weather_geo_url)
        .query(&[
            ("q", city),
            ("limit", "1"),
            ("appid", config.weather_api_key.as_str()),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let coords = geo
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Service(format!("no coordinates found for city '{}'", city)))?;

    let current: UpstreamWeather = client
        .get(&config.weather_data_url)
        .query(&[
            ("lat", coords.lat.to_string()),
            ("lon", coords.lon.to_string()),
            ("units", "metric".to_string()),
            ("appid", config.weather_api_key.clone()),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(build_summary(current))
}

fn build_summary(current: UpstreamWeather) -> Value {
    let description = current
        .weather
        .first()
        .map(|c| c.description.clone())
        .unwrap_or_default();

    json!({
        "weather": description,
        "temp": current.main.temp,
        "humidity": current.main.humidity,
        "sys_sunrise": format_local(current.sys.sunrise),
        "sys_sunset": format_local(current.sys.sunset),
    })
}

fn format_local(epoch: i64) -> String {
    match DateTime::from_timestamp(epoch, 0) {
        Some(utc) => utc
            .with_timezone(&*LOCAL_TZ)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => epoch.to_string(),
    }
}

/// Serialized weather bodies keyed by normalized city name.
///
/// Stores the exact string that went out on the wire, so cache hits are
/// byte-for-byte replays. Stale entries are dropped whenever a new body
/// is stored.
pub struct WeatherCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedBody>>,
}

struct CachedBody {
    body: String,
    stored_at: Instant,
}

impl WeatherCache {
    pub fn new() -> Self {
        Self::with_ttl(CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, city: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(city)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.body.clone())
    }

    pub fn store(&self, city: &str, body: String) {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        entries.insert(
            city.to_string(),
            CachedBody {
                body,
                stored_at: Instant::now(),
            },
        );
    }
}

impl Default for WeatherCache {
    fn default() -> Self {
        Self::new()
    }
}
