//! The Île-de-France transit provider: station search backed by a local
//! reference cache, journey planning, and in-process route selection
//! (spec §4.3.3, §8.4 scenario 5).

pub mod store;
pub mod upstream;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tom_core::model::Tool;
use tom_provider::{ToolOutcome, ToolProvider};
use upstream::{Route, TransitUpstream};

const SERVER_DESCRIPTION: &str = "This module is used for getting public transportation information in Île-de-France (metro, train, bus, tram).";

pub struct IdfmProvider {
    store: store::IdfmStore,
    upstream: Box<dyn TransitUpstream>,
    routes: Mutex<Vec<Route>>,
    selected: Mutex<Option<Route>>,
}

impl IdfmProvider {
    pub fn new(store: store::IdfmStore, upstream: Box<dyn TransitUpstream>) -> Self {
        IdfmProvider { store, upstream, routes: Mutex::new(Vec::new()), selected: Mutex::new(None) }
    }

    /// `search_station`: look up stations matching a free-text name,
    /// keeping only ones the local reference cache already knows (the
    /// upstream search can surface stop areas outside Île-de-France Mobilités'
    /// own reference set), enriching each hit with its city and serving
    /// lines, and caching the station on first sight by name.
    async fn search_station(&self, search_name: &str) -> tom_core::error::Result<Value> {
        let hits = self
            .upstream
            .search_stations(search_name)
            .await
            .map_err(tom_core::error::TomError::ToolUpstreamError)?;

        let mut results = Vec::new();
        for hit in hits {
            if !self.store.known_station(&hit.station_id)? {
                continue;
            }
            let city = self.store.city_for_station(&hit.station_id)?.unwrap_or_default();
            let lines = self.store.lines_for_station(&hit.station_id)?;

            if !self.store.is_station_cached(&hit.station_name)? {
                self.store.cache_station(&hit.station_id, &hit.station_name, &city)?;
            }

            results.push(json!({
                "station_id": hit.station_id,
                "station_name": hit.station_name,
                "city": city,
                "lines": lines.into_iter().map(|l| json!({"line_id": l.line_id, "line_name": l.line_name})).collect::<Vec<_>>(),
            }));
        }
        Ok(Value::Array(results))
    }
}

#[async_trait]
impl ToolProvider for IdfmProvider {
    fn name(&self) -> &str {
        "idfm"
    }

    fn description(&self) -> String {
        SERVER_DESCRIPTION.to_string()
    }

    fn tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: "search_station".into(),
                description: "Search for a metro, train, or tram station by name. Return a list of stations with the station identifier 'station_id,' the station name, the city the station is, and the metro, tram and train lines serving that station.".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {"search_name": {"type": "string", "description": "String used to search for a station. Most of the time a name of a station."}},
                    "required": ["search_name"],
                    "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "search_place_gps".into(),
                description: "Search for the GPS coordinates of a place, poi, address, or location. These GPS coordinates may be necessary to find a route.".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {"search_string": {"type": "string", "description": "String used to search a position GPS for a place, a poi, address or location."}},
                    "required": ["search_string"],
                    "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "plan_a_journey".into(),
                description: "Calculate a route using public transportation in Île-de-France (whether by train, metro, bus, or tram). GPS coordinates should only be used when the departure or arrival location is not a station.".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {
                        "date": {"type": "string", "description": "Departure date of the route. Must be in the form: 'YYYY-MM-DD hh:mm:ss'."},
                        "departure": {"type": "string", "description": "Departure place of the journey to plan. Could be a station_id (retrieved via search_station) or a gps position ('longitude;latitude')."},
                        "arrival": {"type": "string", "description": "Arrival place of the journey to plan. Could be a station_id (retrieved via search_station) or a gps position ('longitude;latitude')."},
                    },
                    "required": ["date", "departure", "arrival"],
                    "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "select_a_route".into(),
                description: "Used only after calling 'plan_a_journey'. If the user is interested in taking one of the suggested routes, stores the desired route as the current route so it can be used to guide the user during their journey.".into(),
                parameters_schema: json!({
                    "type": "object",
                    "properties": {"route_id": {"type": "integer", "description": "ID of the route to keep, from a result of the 'plan_a_journey' call."}},
                    "required": ["route_id"],
                    "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "retrieve_current_selected_route".into(),
                description: "Retrieve detailed information about the current journey: the route chosen by the user, for instance if it's not in the prompt history.".into(),
                parameters_schema: json!({"type": "object", "properties": {}, "required": [], "additionalProperties": false}),
                strict: true,
            },
        ]
    }

    async fn invoke(&self, tool_name: &str, arguments: Value) -> ToolOutcome {
        match tool_name {
            "search_station" => {
                let Some(search_name) = arguments.get("search_name").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("search_name is required");
                };
                match self.search_station(search_name).await {
                    Ok(result) => ToolOutcome::ok(result),
                    Err(e) => ToolOutcome::error(e.to_string()),
                }
            }
            "search_place_gps" => {
                let Some(search_string) = arguments.get("search_string").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("search_string is required");
                };
                match self.upstream.search_places(search_string).await {
                    Ok(places) => ToolOutcome::ok(json!(places
                        .into_iter()
                        .map(|p| json!({"place_name": p.place_name, "city": p.city, "place_type": p.place_type, "gps_lat": p.gps_lat, "gps_lon": p.gps_lon}))
                        .collect::<Vec<_>>())),
                    Err(e) => ToolOutcome::error(e),
                }
            }
            "plan_a_journey" => {
                let (Some(date), Some(departure), Some(arrival)) = (
                    arguments.get("date").and_then(|v| v.as_str()),
                    arguments.get("departure").and_then(|v| v.as_str()),
                    arguments.get("arrival").and_then(|v| v.as_str()),
                ) else {
                    return ToolOutcome::error("date, departure and arrival are required");
                };
                match self.upstream.plan_journey(date, departure, arrival).await {
                    Ok(routes) => {
                        let payload = json!(routes);
                        *self.routes.lock().await = routes;
                        ToolOutcome::ok(payload)
                    }
                    Err(e) => ToolOutcome::error(e),
                }
            }
            "select_a_route" => {
                let Some(route_id) = arguments.get("route_id").and_then(|v| v.as_i64()) else {
                    return ToolOutcome::error("route_id is required");
                };
                let routes = self.routes.lock().await;
                let Ok(idx) = usize::try_from(route_id) else {
                    return ToolOutcome::ok(json!({"status": "error", "message": format!("Invalid route_id: {route_id}")}));
                };
                match routes.get(idx) {
                    Some(route) => {
                        let chosen = route.clone();
                        drop(routes);
                        *self.selected.lock().await = Some(chosen);
                        ToolOutcome::ok(json!({"status": "success", "message": "Route selected successfully"}))
                    }
                    None => ToolOutcome::ok(json!({"status": "error", "message": format!("Invalid route_id: {route_id}")})),
                }
            }
            "retrieve_current_selected_route" => match &*self.selected.lock().await {
                Some(route) => ToolOutcome::ok(json!(route)),
                None => ToolOutcome::error("No route selected"),
            },
            other => ToolOutcome::error(format!("unknown tool '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::{IdfmStore, ReferenceStation};
    use upstream::{InMemoryTransitUpstream, JourneySection, StationSearchHit};

    fn provider() -> (IdfmProvider, std::sync::Arc<InMemoryTransitUpstream>) {
        let store = IdfmStore::open_in_memory().unwrap();
        store
            .load_reference_data(&[ReferenceStation {
                id: "1".into(),
                name: "Chatelet".into(),
                latitude: 48.858,
                longitude: 2.347,
                city: "Paris".into(),
                line_id: "l1".into(),
                line_name: "1".into(),
                line_type: "METRO".into(),
            }])
            .unwrap();
        let upstream = std::sync::Arc::new(InMemoryTransitUpstream::default());
        (IdfmProvider::new(store, Box::new(ForwardingUpstream(upstream.clone()))), upstream)
    }

    struct ForwardingUpstream(std::sync::Arc<InMemoryTransitUpstream>);

    #[async_trait]
    impl TransitUpstream for ForwardingUpstream {
        async fn search_stations(&self, query: &str) -> Result<Vec<StationSearchHit>, String> {
            self.0.search_stations(query).await
        }
        async fn search_places(&self, query: &str) -> Result<Vec<upstream::PlaceResult>, String> {
            self.0.search_places(query).await
        }
        async fn plan_journey(&self, date: &str, departure: &str, arrival: &str) -> Result<Vec<Route>, String> {
            self.0.plan_journey(date, departure, arrival).await
        }
    }

    #[tokio::test]
    async fn search_station_drops_stations_not_in_reference_cache() {
        let (provider, upstream) = provider();
        upstream
            .seed_station(StationSearchHit { station_id: "999".into(), station_name: "Unknown".into(), city: "".into() })
            .await;
        let outcome = provider.invoke("search_station", json!({"search_name": "unknown"})).await.into_json();
        assert_eq!(outcome["result"], json!([]));
    }

    #[tokio::test]
    async fn search_station_enriches_known_station_with_city_and_lines() {
        let (provider, upstream) = provider();
        upstream
            .seed_station(StationSearchHit { station_id: "1".into(), station_name: "Chatelet".into(), city: "".into() })
            .await;
        let outcome = provider.invoke("search_station", json!({"search_name": "chatelet"})).await.into_json();
        let hits = outcome["result"].as_array().unwrap();
        assert_eq!(hits[0]["city"], "Paris");
        assert_eq!(hits[0]["lines"][0]["line_name"], "1");
    }

    #[tokio::test]
    async fn select_a_route_then_retrieve_roundtrips() {
        let (provider, upstream) = provider();
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
                    sections: vec![JourneySection {
                        section_type: "METRO 1".into(),
                        section_duration_in_seconds: 1200,
                        section_from: Some("Chatelet".into()),
                        section_to: Some("Nation".into()),
                        section_departure_datetime: Some("2025-01-20 18:00:00".into()),
                        section_arrival_datetime: Some("2025-01-20 18:20:00".into()),
                    }],
                }],
            )
            .await;

        provider
            .invoke("plan_a_journey", json!({"date": "2025-01-20 18:00:00", "departure": "1", "arrival": "2"}))
            .await;
        let select = provider.invoke("select_a_route", json!({"route_id": 0})).await.into_json();
        assert_eq!(select["result"]["status"], "success");

        let current = provider.invoke("retrieve_current_selected_route", json!({})).await.into_json();
        assert_eq!(current["result"]["duration_in_seconds"], 1200);
    }

    #[tokio::test]
    async fn retrieve_current_selected_route_errors_when_none_selected() {
        let (provider, _upstream) = provider();
        let outcome = provider.invoke("retrieve_current_selected_route", json!({})).await.into_json();
        assert_eq!(outcome["status"], "error");
    }

    #[tokio::test]
    async fn select_a_route_rejects_out_of_range_id() {
        let (provider, _upstream) = provider();
        let outcome = provider.invoke("select_a_route", json!({"route_id": 5})).await.into_json();
        assert_eq!(outcome["result"]["status"], "error");
    }
}
