//! The weather provider: city-name geocoding backed by a persisted GPS
//! cache, and GPS-position forecast lookup (spec §4.3.3).

pub mod store;
pub mod upstream;

use async_trait::async_trait;
use serde_json::{json, Value};
use store::{CachedCity, WeatherStore};
use tom_core::model::Tool;
use tom_provider::{ToolOutcome, ToolProvider};
use upstream::WeatherUpstream;

const SERVER_DESCRIPTION: &str = "This module is used for for any question about the weather forecast.";

pub struct WeatherProvider {
    store: WeatherStore,
    upstream: Box<dyn WeatherUpstream>,
}

impl WeatherProvider {
    pub fn new(store: WeatherStore, upstream: Box<dyn WeatherUpstream>) -> Self {
        WeatherProvider { store, upstream }
    }

    /// `get_city_gps`: cache-first lookup, falling back to a geocoding
    /// call and caching the single best (first) hit on a miss.
    async fn city_gps(&self, city_name: &str) -> tom_core::error::Result<Vec<CachedCity>> {
        if let Some(cached) = self.store.find_by_name(city_name)? {
            return Ok(vec![cached]);
        }

        let hits = self.upstream.geocode(city_name).await.map_err(tom_core::error::TomError::ToolUpstreamError)?;
        if let Some(first) = hits.first() {
            self.store.insert(&CachedCity {
                name: first.name.clone(),
                country: first.country.clone(),
                gps_latitude: first.gps_latitude,
                gps_longitude: first.gps_longitude,
            })?;
        }
        Ok(hits
            .into_iter()
            .map(|c| CachedCity { name: c.name, country: c.country, gps_latitude: c.gps_latitude, gps_longitude: c.gps_longitude })
            .collect())
    }
}

#[async_trait]
impl ToolProvider for WeatherProvider {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> String {
        SERVER_DESCRIPTION.to_string()
    }

    fn tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: "weather_get_by_gps_position".into(),
                description: "Get the weather forecast. Call this function when user asks information about the weather or anything related to it. This function needs to be called with the exact GPS position.".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "gps_latitude": {"type": "string", "description": "GPS latitude"},
                        "gps_longitude": {"type": "string", "description": "GPS longitude"},
                        "period_from": {"type": "string", "description": "Must be in the form of 'YYYY-MM-DD'. Starting date to search for."},
                        "period_to": {"type": "string", "description": "Must be in the form of 'YYYY-MM-DD'. Ending date to search for."},
                    },
                    "required": ["gps_latitude", "gps_longitude", "period_from", "period_to"],
                    "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "get_gps_position_by_city_name".into(),
                description: "Get the GPS position for a city by its name. Call this function when you need a GPS position and you only have the city name.".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {"city_name": {"type": "string", "description": "Name of the city you are looking for GPS position"}},
                    "required": ["city_name"],
                    "additionalProperties": false,
                }),
                strict: true,
            },
        ]
    }

    async fn invoke(&self, tool_name: &str, arguments: Value) -> ToolOutcome {
        match tool_name {
            "get_gps_position_by_city_name" => {
                let Some(city_name) = arguments.get("city_name").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("city_name is required");
                };
                match self.city_gps(city_name).await {
                    Ok(cities) => ToolOutcome::ok(json!(cities
                        .into_iter()
                        .map(|c| json!({"name": c.name, "country": c.country, "gps_latitude": c.gps_latitude, "gps_longitude": c.gps_longitude}))
                        .collect::<Vec<_>>())),
                    Err(e) => ToolOutcome::error(e.to_string()),
                }
            }
            "weather_get_by_gps_position" => {
                let (Some(lat_str), Some(lon_str), Some(period_from), Some(period_to)) = (
                    arguments.get("gps_latitude").and_then(|v| v.as_str()),
                    arguments.get("gps_longitude").and_then(|v| v.as_str()),
                    arguments.get("period_from").and_then(|v| v.as_str()),
                    arguments.get("period_to").and_then(|v| v.as_str()),
                ) else {
                    return ToolOutcome::error("gps_latitude, gps_longitude, period_from and period_to are required");
                };
                let (Ok(latitude), Ok(longitude)) = (lat_str.parse::<f64>(), lon_str.parse::<f64>()) else {
                    return ToolOutcome::error("gps_latitude and gps_longitude must be numeric");
                };
                match self.upstream.forecast(latitude, longitude, period_from, period_to).await {
                    Ok(forecast) => ToolOutcome::ok(json!(forecast)),
                    Err(e) => ToolOutcome::ok(json!({"error": format!("Failed to fetch weather data: {e}")})),
                }
            }
            other => ToolOutcome::error(format!("unknown tool '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upstream::{DailyPoint, Forecast, GeocodedCity, HourlyPoint, InMemoryWeatherUpstream};

    fn provider_with_upstream() -> (WeatherProvider, std::sync::Arc<InMemoryWeatherUpstream>) {
        let upstream = std::sync::Arc::new(InMemoryWeatherUpstream::default());
        (WeatherProvider::new(WeatherStore::open_in_memory().unwrap(), Box::new(ForwardingUpstream(upstream.clone()))), upstream)
    }

    struct ForwardingUpstream(std::sync::Arc<InMemoryWeatherUpstream>);

    #[async_trait]
    impl WeatherUpstream for ForwardingUpstream {
        async fn geocode(&self, city_name: &str) -> Result<Vec<GeocodedCity>, String> {
            self.0.geocode(city_name).await
        }
        async fn forecast(&self, latitude: f64, longitude: f64, period_from: &str, period_to: &str) -> Result<Forecast, String> {
            self.0.forecast(latitude, longitude, period_from, period_to).await
        }
    }

    #[tokio::test]
    async fn get_gps_position_by_city_name_caches_first_hit() {
        let (provider, upstream) = provider_with_upstream();
        upstream
            .seed_city(
                "paris",
                vec![
                    GeocodedCity { name: "Paris".into(), country: "France".into(), gps_latitude: 48.85, gps_longitude: 2.35 },
                    GeocodedCity { name: "Paris".into(), country: "United States".into(), gps_latitude: 33.66, gps_longitude: -95.55 },
                ],
            )
            .await;
        let outcome = provider.invoke("get_gps_position_by_city_name", json!({"city_name": "Paris"})).await.into_json();
        assert_eq!(outcome["result"].as_array().unwrap().len(), 2);
        assert_eq!(provider.store.find_by_name("Paris").unwrap().unwrap().country, "France");
    }

    #[tokio::test]
    async fn second_lookup_hits_cache_without_calling_upstream_again() {
        let (provider, upstream) = provider_with_upstream();
        upstream
            .seed_city("lyon", vec![GeocodedCity { name: "Lyon".into(), country: "France".into(), gps_latitude: 45.75, gps_longitude: 4.85 }])
            .await;
        provider.invoke("get_gps_position_by_city_name", json!({"city_name": "lyon"})).await;
        // Remove the seed: a cache hit must not depend on the upstream anymore.
        upstream.seed_city("lyon", vec![]).await;
        let outcome = provider.invoke("get_gps_position_by_city_name", json!({"city_name": "Lyon"})).await.into_json();
        assert_eq!(outcome["result"][0]["name"], "Lyon");
    }

    #[tokio::test]
    async fn weather_get_by_gps_position_returns_seeded_forecast() {
        let (provider, upstream) = provider_with_upstream();
        upstream
            .seed_forecast(
                48.85,
                2.35,
                Forecast {
                    hourly: vec![HourlyPoint {
                        timestamp: "2025-01-20T12:00".into(),
                        temperature: 5.0,
                        apparent_temperature: 3.0,
                        weather_condition: "Clear sky".into(),
                    }],
                    daily: vec![DailyPoint {
                        timestamp: "2025-01-20".into(),
                        temperature_min: 1.0,
                        temperature_max: 8.0,
                        apparent_temperature_min: -1.0,
                        apparent_temperature_max: 6.0,
                        weather_condition: "Clear sky".into(),
                    }],
                },
            )
            .await;
        let outcome = provider
            .invoke("weather_get_by_gps_position", json!({"gps_latitude": "48.85", "gps_longitude": "2.35", "period_from": "2025-01-20", "period_to": "2025-01-21"}))
            .await
            .into_json();
        assert_eq!(outcome["result"]["hourly"][0]["weather_condition"], "Clear sky");
    }

    #[tokio::test]
    async fn weather_get_by_gps_position_rejects_non_numeric_coordinates() {
        let (provider, _upstream) = provider_with_upstream();
        let outcome = provider
            .invoke("weather_get_by_gps_position", json!({"gps_latitude": "not-a-number", "gps_longitude": "2.35", "period_from": "2025-01-20", "period_to": "2025-01-21"}))
            .await
            .into_json();
        assert_eq!(outcome["status"], "error");
    }
}
