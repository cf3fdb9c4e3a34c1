use rocket::fairing::AdHoc;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};
use tracing::error;

const DESCRIPTION: &str = include_str!("../endpoints.json");

/// Parsed contents of `endpoints.json`, managed by [`stage`].
pub struct Endpoints(Value);

/// Parses the compiled-in endpoint description at ignition. A description
/// that is not valid JSON aborts launch.
pub fn stage() -> AdHoc {
    stage_with(DESCRIPTION)
}

pub fn stage_with(raw: &'static str) -> AdHoc {
    AdHoc::try_on_ignite("Endpoint Description", move |rocket| async move {
        match serde_json::from_str::<Value>(raw) {
            Ok(endpoints) => Ok(rocket.manage(Endpoints(endpoints))),
            Err(e) => {
                error!(error = %e, "endpoint description is not valid JSON");
                Err(rocket)
            }
        }
    })
}

#[get("/")]
pub fn describe(endpoints: &State<Endpoints>) -> Json<Value> {
    Json(json!({ "endpoints": endpoints.0 }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::local::blocking::Client;

    #[test]
    fn description_covers_every_route() {
        let endpoints: Value = serde_json::from_str(DESCRIPTION).unwrap();
        let documented = endpoints.as_object().unwrap();
        for route in crate::api_routes() {
            let uri = route.uri.to_string();
            let path = uri.split('?').next().unwrap_or_default();
            let path = format!("/api{}", path.replace('<', ":").replace('>', ""));
            let key = format!("{} {}", route.method, path.trim_end_matches('/'));
            assert!(documented.contains_key(&key), "{} is not documented", key);
        }
    }

    #[test]
    fn broken_description_stops_launch() {
        let rocket = rocket::build().attach(stage_with("{\"GET /api\": "));
        assert!(Client::tracked(rocket).is_err());
    }

    #[test]
    fn description_is_served_from_state() {
        let rocket = rocket::build()
            .attach(stage_with(r#"{"GET /api": {"description": "this"}}"#))
            .mount("/api", routes![describe]);
        let client = Client::tracked(rocket).unwrap();
        let body = client.get("/api").dispatch().into_json::<Value>().unwrap();
        assert_eq!(body["endpoints"]["GET /api"]["description"], "this");
    }
}
