use axum::Json;

pub async fn hello() -> &'static str {
    "Together API is running"
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "together",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
