use axum::Json;

use crate::auth::AuthUser;

// Echo the identity behind the caller's token
pub async fn verify_handler(AuthUser(identity): AuthUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "user": identity }))
}
