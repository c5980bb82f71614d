//! The open-meteo geocoding and forecast APIs (spec §1: third-party
//! weather data is out of scope for this core). `InMemoryWeatherUpstream`
//! is a deterministic stand-in good enough to exercise the cache and tool
//! contract.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct GeocodedCity {
    pub name: String,
    pub country: String,
    pub gps_latitude: f64,
    pub gps_longitude: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HourlyPoint {
    pub timestamp: String,
    pub temperature: f64,
    pub apparent_temperature: f64,
    pub weather_condition: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DailyPoint {
    pub timestamp: String,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub apparent_temperature_min: f64,
    pub apparent_temperature_max: f64,
    pub weather_condition: String,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Forecast {
    pub hourly: Vec<HourlyPoint>,
    pub daily: Vec<DailyPoint>,
}

/// `convert_wmo`: WMO weather-code table, used by a real upstream
/// implementation to resolve `open-meteo`'s numeric `weather_code` into
/// the description every hourly/daily point carries.
pub fn describe_weather_code(code: &str) -> String {
    match code {
        "0" => "Clear sky",
        "1" => "Mainly clear sky",
        "2" => "Sky partly cloudy",
        "3" => "Sky overcast",
        "45" => "Fog",
        "48" => "Depositing rime fog",
        "51" => "Light drizzle",
        "53" => "Moderate drizzle",
        "55" => "Dense drizzle",
        "56" => "Freezing drizzle light intensity",
        "57" => "Freezing drizzle dense intensity",
        "61" => "Slight rain",
        "63" => "Moderate rain",
        "65" => "Heavy rain",
        "66" => "Light freezing rain",
        "67" => "Heavy freezing rain",
        "71" => "Slight snow fall",
        "73" => "Moderate snow fall",
        "75" => "Heavy snow fall",
        "77" => "Snow grains",
        "80" => "Slight rain showers",
        "81" => "Moderate rain showers",
        "82" => "Violent rain showers",
        "85" => "Slight snow showers",
        "86" => "Heavy snow showers",
        "95" => "Slight or moderate thunderstorm",
        "96" => "Thunderstorm with slight hail",
        "99" => "Thunderstorm with heavy hail",
        other => return format!("Unknown weather code: {other}"),
    }
    .to_string()
}

#[async_trait]
pub trait WeatherUpstream: Send + Sync {
    /// Up to 10 geocoding hits for a free-text city name
    /// (`urlGeocoding?name=...&count=10`).
    async fn geocode(&self, city_name: &str) -> Result<Vec<GeocodedCity>, String>;

    /// Hourly and daily points already filtered to `[period_from,
    /// period_to]` and with WMO codes already resolved to a description —
    /// `get_weather_by_gps` does that filtering itself after one 16-day
    /// forecast call, which this seam folds into a single method.
    async fn forecast(&self, latitude: f64, longitude: f64, period_from: &str, period_to: &str) -> Result<Forecast, String>;
}

pub struct InMemoryWeatherUpstream {
    cities: Mutex<HashMap<String, Vec<GeocodedCity>>>,
    forecasts: Mutex<HashMap<(String, String), Forecast>>,
}

impl Default for InMemoryWeatherUpstream {
    fn default() -> Self {
        Self { cities: Mutex::new(HashMap::new()), forecasts: Mutex::new(HashMap::new()) }
    }
}

impl InMemoryWeatherUpstream {
    pub async fn seed_city(&self, query: &str, hits: Vec<GeocodedCity>) {
        self.cities.lock().await.insert(query.to_lowercase(), hits);
    }

    fn forecast_key(latitude: f64, longitude: f64) -> (String, String) {
        (format!("{latitude:.4}"), format!("{longitude:.4}"))
    }

    pub async fn seed_forecast(&self, latitude: f64, longitude: f64, forecast: Forecast) {
        self.forecasts.lock().await.insert(Self::forecast_key(latitude, longitude), forecast);
    }
}

#[async_trait]
impl WeatherUpstream for InMemoryWeatherUpstream {
    async fn geocode(&self, city_name: &str) -> Result<Vec<GeocodedCity>, String> {
        Ok(self.cities.lock().await.get(&city_name.to_lowercase()).cloned().unwrap_or_default())
    }

    async fn forecast(&self, latitude: f64, longitude: f64, _period_from: &str, _period_to: &str) -> Result<Forecast, String> {
        Ok(self.forecasts.lock().await.get(&Self::forecast_key(latitude, longitude)).cloned().unwrap_or_default())
    }
}
