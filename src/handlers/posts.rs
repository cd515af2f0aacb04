use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::auth::{AdminUser, MaybeUser};
use crate::error::ApiError;
use crate::models::{
    CreatePostRequest, ListPostsQuery, MessageResponse, Pagination, Post, PostFilter, PostPage,
    Role, UpdatePostRequest,
};
use crate::slug::{self, EntityKind};
use crate::state::AppState;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;
pub const FEATURED_COUNT: usize = 5;

fn require_title_and_content(payload: &CreatePostRequest) -> Result<(), ApiError> {
    if payload.title.trim().is_empty() || payload.content.trim().is_empty() {
        return Err(ApiError::BadRequest("Title and content are required".to_string()));
    }
    Ok(())
}

// Blank means "no category"; anything else must name an existing one
fn resolve_category(state: &AppState, raw: Option<&str>) -> Result<Option<Uuid>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };

    Uuid::parse_str(raw)
        .ok()
        .and_then(|id| state.store.category(id))
        .map(|c| Some(c.id))
        .ok_or_else(|| ApiError::BadRequest(format!("Category {raw} not found")))
}

// Drafts are listed only for admins asking with published=false
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<ListPostsQuery>,
) -> Json<PostPage> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    let is_admin = user.is_some_and(|u| u.role == Role::Admin);
    let wants_drafts = query.published.as_deref().is_some_and(|p| p != "true");

    let category = query.category.as_deref().filter(|c| !c.is_empty());
    let category_id = category.map(|slug| state.store.category_by_slug(slug).map(|c| c.id));

    let matching = match category_id {
        // unknown category slug matches nothing
        Some(None) => Vec::new(),
        _ => state.store.posts(&PostFilter {
            published_only: !(is_admin && wants_drafts),
            featured_only: false,
            category_id: category_id.flatten(),
            search: query.search.filter(|s| !s.trim().is_empty()),
        }),
    };

    let total = matching.len();
    let posts = matching
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect();

    Json(PostPage {
        posts,
        pagination: Pagination {
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        },
    })
}

pub async fn featured_posts(State(state): State<Arc<AppState>>) -> Json<Vec<Post>> {
    let mut posts = state.store.posts(&PostFilter {
        published_only: true,
        featured_only: true,
        ..PostFilter::default()
    });
    posts.truncate(FEATURED_COUNT);
    Json(posts)
}

pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Post>, ApiError> {
    state
        .store
        .post_by_slug(&slug)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))
}

pub async fn create_post(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    require_title_and_content(&payload)?;
    let category_id = resolve_category(&state, payload.category_id.as_deref())?;

    let now = state.now();
    let slug = slug::allocate(&payload.title, EntityKind::Post, now.timestamp_millis(), |candidate| {
        state.store.post_slug_exists(candidate)
    })?;

    let post = state.store.insert_post(Post {
        id: Uuid::new_v4(),
        title: payload.title,
        slug,
        content: payload.content,
        excerpt: payload.excerpt,
        published: payload.published,
        featured: payload.featured,
        author_id: admin.id,
        category_id,
        published_at: payload.published.then_some(now),
        created_at: now,
        updated_at: now,
    })?;

    tracing::info!(slug = %post.slug, author = %admin.username, "Post created");
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(slug): Path<String>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>, ApiError> {
    require_title_and_content(&payload)?;

    let existing = state
        .store
        .post_by_slug(&slug)
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;
    let category_id = resolve_category(&state, payload.category_id.as_deref())?;

    let now = state.now();
    let new_slug = slug::reallocate(
        &payload.title,
        &existing.title,
        &existing.slug,
        EntityKind::Post,
        now.timestamp_millis(),
        |candidate| state.store.post_slug_exists(candidate),
    )?;

    let published_at = if payload.published && !existing.published {
        Some(now)
    } else {
        existing.published_at
    };

    let post = state.store.update_post(Post {
        title: payload.title,
        slug: new_slug,
        content: payload.content,
        excerpt: payload.excerpt,
        published: payload.published,
        featured: payload.featured,
        category_id,
        published_at,
        updated_at: now,
        ..existing
    })?;

    if post.slug != slug {
        tracing::info!(from = %slug, to = %post.slug, "Post slug changed");
    }
    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Path(slug): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let post = state
        .store
        .post_by_slug(&slug)
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;
    state.store.delete_post(post.id);

    tracing::info!(slug = %slug, "Post deleted");
    Ok(Json(MessageResponse {
        message: "Post deleted".to_string(),
    }))
}
