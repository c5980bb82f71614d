//! The Navitia-shaped journey-planning API (spec §1: external transit
//! APIs are out of scope for this core). This trait is the seam a real
//! IDFM/Navitia client plugs into; `InMemoryTransitUpstream` is a
//! deterministic stand-in good enough to exercise the tool contract and
//! spec §8.4 scenario 5.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct PlaceResult {
    pub place_name: String,
    pub city: String,
    pub place_type: String,
    pub gps_lat: f64,
    pub gps_lon: f64,
}

#[derive(Debug, Clone)]
pub struct StationSearchHit {
    pub station_id: String,
    pub station_name: String,
    pub city: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct JourneySection {
    pub section_type: String,
    pub section_duration_in_seconds: i64,
    pub section_from: Option<String>,
    pub section_to: Option<String>,
    pub section_departure_datetime: Option<String>,
    pub section_arrival_datetime: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Route {
    pub route_id: usize,
    pub departure_datetime: String,
    pub arrival_datetime: String,
    pub duration_in_seconds: i64,
    pub nb_transfers: i64,
    pub sections: Vec<JourneySection>,
}

#[async_trait]
pub trait TransitUpstream: Send + Sync {
    /// Raw place/station search by free text, matching the `/places`
    /// endpoint's `stop_area` hits filtered against the known-station set
    /// by the caller.
    async fn search_stations(&self, query: &str) -> Result<Vec<StationSearchHit>, String>;

    async fn search_places(&self, query: &str) -> Result<Vec<PlaceResult>, String>;

    /// `date` is `'%Y-%m-%d %H:%M:%S'`; `departure`/`arrival` are either a
    /// bare station id or a `'longitude;latitude'` GPS pair, matching
    /// `plan_journey`'s own argument handling.
    async fn plan_journey(&self, date: &str, departure: &str, arrival: &str) -> Result<Vec<Route>, String>;
}

pub struct InMemoryTransitUpstream {
    stations: Mutex<HashMap<String, StationSearchHit>>,
    routes_by_pair: Mutex<HashMap<(String, String), Vec<Route>>>,
}

impl Default for InMemoryTransitUpstream {
    fn default() -> Self {
        Self {
            stations: Mutex::new(HashMap::new()),
            routes_by_pair: Mutex::new(HashMap::new()),
        }
    }
}

impl InMemoryTransitUpstream {
    pub async fn seed_station(&self, hit: StationSearchHit) {
        self.stations.lock().await.insert(hit.station_name.to_lowercase(), hit);
    }

    pub async fn seed_route(&self, departure: &str, arrival: &str, routes: Vec<Route>) {
        self.routes_by_pair.lock().await.insert((departure.to_string(), arrival.to_string()), routes);
    }
}

#[async_trait]
impl TransitUpstream for InMemoryTransitUpstream {
    async fn search_stations(&self, query: &str) -> Result<Vec<StationSearchHit>, String> {
        let query = query.to_lowercase();
        Ok(self
            .stations
            .lock()
            .await
            .values()
            .filter(|s| s.station_name.to_lowercase().contains(&query))
            .cloned()
            .collect())
    }

    async fn search_places(&self, query: &str) -> Result<Vec<PlaceResult>, String> {
        let hits = self.search_stations(query).await?;
        Ok(hits
            .into_iter()
            .map(|h| PlaceResult {
                place_name: h.station_name,
                city: h.city,
                place_type: "Station".to_string(),
                gps_lat: 0.0,
                gps_lon: 0.0,
            })
            .collect())
    }

    async fn plan_journey(&self, _date: &str, departure: &str, arrival: &str) -> Result<Vec<Route>, String> {
        Ok(self
            .routes_by_pair
            .lock()
            .await
            .get(&(departure.to_string(), arrival.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_stations_matches_substring_case_insensitively() {
        let upstream = InMemoryTransitUpstream::default();
        upstream
            .seed_station(StationSearchHit { station_id: "1".into(), station_name: "Chatelet".into(), city: "Paris".into() })
            .await;
        let hits = upstream.search_stations("chatelet").await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn plan_journey_returns_seeded_routes_for_exact_pair() {
        let upstream = InMemoryTransitUpstream::default();
        upstream
            .seed_route(
                "1",
                "2",
                vec![Route {
                    route_id: 0,
                    departure_datetime: "2025-01-20 18:00:00".into(),
                    arrival_datetime: "2025-01-20 18:20:00".into(),
                    duration_in_seconds: 1200,
                    nb_transfers: 0,
                    sections: vec![],
                }],
            )
            .await;
        let routes = upstream.plan_journey("2025-01-20 18:00:00", "1", "2").await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].duration_in_seconds, 1200);
    }

    #[tokio::test]
    async fn plan_journey_empty_for_unknown_pair() {
        let upstream = InMemoryTransitUpstream::default();
        let routes = upstream.plan_journey("2025-01-20 18:00:00", "1", "2").await.unwrap();
        assert!(routes.is_empty());
    }
}
