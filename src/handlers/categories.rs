use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::models::{Category, CreateCategoryRequest};
use crate::slug::{self, EntityKind};
use crate::state::AppState;

pub async fn list_categories(State(state): State<Arc<AppState>>) -> Json<Vec<Category>> {
    Json(state.store.categories())
}

pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Category>, ApiError> {
    state
        .store
        .category_by_slug(&slug)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Category not found".to_string()))
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Category name is required".to_string()));
    }

    let slug = slug::allocate(name, EntityKind::Category, state.now_millis(), |candidate| {
        state.store.category_slug_exists(candidate)
    })?;

    let category = state.store.insert_category(Category {
        id: Uuid::new_v4(),
        name: name.to_string(),
        slug,
        description: payload.description,
    })?;

    tracing::info!(slug = %category.slug, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}
