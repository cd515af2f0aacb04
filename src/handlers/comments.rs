use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser, ClientKey, MaybeUser};
use crate::error::ApiError;
use crate::metrics::{COMMENTS_CREATED, RATE_LIMIT_DENIED};
use crate::models::{
    AdminCommentList, AdminCommentView, AuthorSummary, Comment, CommentView, CreateCommentRequest,
    MessageResponse, PostSummary, Role,
};
use crate::rate_limit::{Decision, DenyReason, RateLimitPolicy, RateStatus};
use crate::state::AppState;

#[derive(Serialize)]
pub struct RateLimitStatusResponse {
    pub ip: String,
    #[serde(flatten)]
    pub status: RateStatus,
}

// local@domain.tld, no whitespace
fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let clean = |s: &str| !s.is_empty() && !s.contains('@') && !s.chars().any(char::is_whitespace);
    if !clean(local) || !clean(domain) {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

fn denial_message(reason: DenyReason, policy: &RateLimitPolicy) -> String {
    match reason {
        DenyReason::TooManyInWindow => format!(
            "Too many comments: guests may post at most {} comments every {} minutes. Try again later or sign in.",
            policy.max_in_window,
            policy.window_ms / 60_000
        ),
        DenyReason::TooSoon => format!(
            "Too many comments: guests may post one comment every {} seconds. Try again shortly.",
            policy.cooldown_ms / 1000
        ),
    }
}

fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

fn author_of(state: &AppState, comment: &Comment) -> Option<AuthorSummary> {
    comment
        .author_id
        .and_then(|id| state.store.user(id))
        .map(|u| AuthorSummary::from(&u))
}

fn view(state: &AppState, comment: Comment, replies: Vec<CommentView>) -> CommentView {
    let author = author_of(state, &comment);
    CommentView {
        comment,
        author,
        replies,
    }
}

pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    ClientKey(client): ClientKey,
    Path(post_id): Path<String>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentView>), ApiError> {
    let content = payload.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Comment content is required".to_string()));
    }

    let post = parse_id(&post_id)
        .and_then(|id| state.store.post(id))
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    if let Some(parent_id) = payload.parent_id {
        let parent_ok = state
            .store
            .comment(parent_id)
            .is_some_and(|parent| parent.post_id == post.id);
        if !parent_ok {
            return Err(ApiError::BadRequest("Parent comment not found".to_string()));
        }
    }

    let (guest_name, guest_email) = match &user {
        Some(_) => (None, None),
        None => {
            let name = payload.guest_name.as_deref().map(str::trim).unwrap_or_default();
            let email = payload.guest_email.as_deref().map(str::trim).unwrap_or_default();
            if name.is_empty() || email.is_empty() {
                return Err(ApiError::BadRequest(
                    "Guest comments need a name and an email".to_string(),
                ));
            }
            if !is_plausible_email(email) {
                return Err(ApiError::BadRequest("Invalid email address".to_string()));
            }
            (Some(name.to_string()), Some(email.to_string()))
        }
    };

    // Signed-in users are not limited here
    if user.is_none() {
        let limiter = &state.comment_limiter;
        if let Decision::Denied { reason, retry_after_ms } =
            limiter.check_and_record(&client, state.now_millis())
        {
            RATE_LIMIT_DENIED.with_label_values(&[reason.as_str()]).inc();
            tracing::info!(client = %client, reason = reason.as_str(), "Comment rate limited");
            return Err(ApiError::TooManyRequests {
                message: denial_message(reason, &limiter.policy()),
                retry_after_secs: u64::try_from(retry_after_ms).unwrap_or(0).div_ceil(1000),
            });
        }
    }

    let comment = state.store.insert_comment(Comment {
        id: Uuid::new_v4(),
        content: content.to_string(),
        post_id: post.id,
        parent_id: payload.parent_id,
        author_id: user.as_ref().map(|u| u.id),
        guest_name,
        guest_email,
        created_at: state.now(),
    });

    let author_type = if user.is_some() { "user" } else { "guest" };
    COMMENTS_CREATED.with_label_values(&[author_type]).inc();
    tracing::debug!(post = %post.slug, comment = %comment.id, author_type, "Comment created");

    Ok((StatusCode::CREATED, Json(view(&state, comment, Vec::new()))))
}

// Every comment across posts, newest first
pub async fn list_all_comments(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
) -> Json<AdminCommentList> {
    let comments = state
        .store
        .all_comments()
        .into_iter()
        .map(|comment| AdminCommentView {
            author: author_of(&state, &comment),
            post: state.store.post(comment.post_id).map(|p| PostSummary::from(&p)),
            comment,
        })
        .collect();
    Json(AdminCommentList { comments })
}

// Top-level comments newest first, each with its replies oldest first
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<String>,
) -> Result<Json<Vec<CommentView>>, ApiError> {
    let post = parse_id(&post_id)
        .and_then(|id| state.store.post(id))
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    let mut all = state.store.comments_for_post(post.id);
    all.sort_by_key(|c| c.created_at);

    let (roots, replies): (Vec<Comment>, Vec<Comment>) =
        all.into_iter().partition(|c| c.parent_id.is_none());

    let mut threads: Vec<CommentView> = roots
        .into_iter()
        .map(|root| {
            let children = replies
                .iter()
                .filter(|r| r.parent_id == Some(root.id))
                .map(|r| view(&state, r.clone(), Vec::new()))
                .collect();
            view(&state, root, children)
        })
        .collect();
    threads.reverse();

    Ok(Json(threads))
}

pub async fn delete_comment(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(comment_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let comment = parse_id(&comment_id)
        .and_then(|id| state.store.comment(id))
        .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

    if comment.author_id != Some(user.id) && user.role != Role::Admin {
        return Err(ApiError::Forbidden(
            "Only the author or an admin may delete this comment".to_string(),
        ));
    }

    state.store.delete_comment(comment.id);
    tracing::info!(comment = %comment.id, by = %user.username, "Comment deleted");
    Ok(Json(MessageResponse {
        message: "Comment deleted".to_string(),
    }))
}

// Read-only view of the caller's comment allowance
pub async fn rate_limit_status(
    State(state): State<Arc<AppState>>,
    ClientKey(client): ClientKey,
) -> Json<RateLimitStatusResponse> {
    let status = state.comment_limiter.status(&client, state.now_millis());
    Json(RateLimitStatusResponse { ip: client, status })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_check_matches_simple_shape() {
        assert!(is_plausible_email("a@b.co"));
        assert!(is_plausible_email("first.last@mail.example.org"));
        assert!(!is_plausible_email("no-at-sign.com"));
        assert!(!is_plausible_email("a@nodot"));
        assert!(!is_plausible_email("a@.com"));
        assert!(!is_plausible_email("a@com."));
        assert!(!is_plausible_email("a b@c.com"));
        assert!(!is_plausible_email("a@b@c.com"));
        assert!(!is_plausible_email("@b.com"));
    }

    #[test]
    fn denial_messages_mention_policy() {
        let policy = RateLimitPolicy::default();
        assert!(denial_message(DenyReason::TooManyInWindow, &policy).contains("10 comments every 10 minutes"));
        assert!(denial_message(DenyReason::TooSoon, &policy).contains("60 seconds"));
    }
}
