use axum::Json;
use serde_json::{json, Value};

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Booking agent is running" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "message": "Booking agent is operational" }))
}
