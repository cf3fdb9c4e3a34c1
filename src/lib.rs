//! REST API over topics, articles, comments and users stored in PostgreSQL.

#[macro_use]
extern crate rocket;

pub mod article;
pub mod comment;
pub mod db;
pub mod endpoints;
pub mod logging;
pub mod topic;
pub mod types;
pub mod users;
pub mod utils;

use rocket::http::Status;
use rocket::request::Request;
use rocket::serde::json::Json;
use rocket::{Build, Rocket, Route};
use serde_json::{json, Value};

#[catch(404)]
fn not_found(_req: &Request) -> Json<Value> {
    Json(json!({ "msg": "Path not found" }))
}

#[catch(default)]
fn fallback(status: Status, _req: &Request) -> Json<Value> {
    Json(json!({ "msg": status.reason().unwrap_or("Unexpected error") }))
}

/// Every route served under `/api`.
pub fn api_routes() -> Vec<Route> {
    routes![
        endpoints::describe,
        topic::list,
        topic::create,
        article::list,
        article::get,
        article::create,
        article::update_votes,
        article::delete,
        comment::list,
        comment::add,
        comment::update_votes,
        comment::delete,
        users::list,
        users::get,
    ]
}

/// Assembles the application around an existing connection pool.
pub fn rocket(pool: db::Pool) -> Rocket<Build> {
    rocket::build()
        .manage(pool)
        .attach(logging::RequestTrace)
        .attach(endpoints::stage())
        .mount("/api", api_routes())
        .register("/", catchers![not_found, fallback])
}
