use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// Public part of a user shown next to their content
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: String,
    pub name: Option<String>,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            name: user.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub published: bool,
    pub featured: bool,
    pub author_id: Uuid,
    pub category_id: Option<Uuid>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// What a post listing selects; unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub published_only: bool,
    pub featured_only: bool,
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
}

impl PostFilter {
    pub fn matches(&self, post: &Post) -> bool {
        if self.published_only && !post.published {
            return false;
        }
        if self.featured_only && !post.featured {
            return false;
        }
        if self.category_id.is_some() && post.category_id != self.category_id {
            return false;
        }
        match self.search.as_deref().map(str::to_lowercase) {
            Some(needle) => [Some(post.title.as_str()), Some(post.content.as_str()), post.excerpt.as_deref()]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle)),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            title: post.title.clone(),
            slug: post.slug.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub post_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub author_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Comment as returned to readers, with author and (for top-level ones) replies
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<AuthorSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<CommentView>,
}

// Moderation listing entry
#[derive(Debug, Clone, Serialize)]
pub struct AdminCommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Option<AuthorSummary>,
    pub post: Option<PostSummary>,
}

#[derive(Debug, Serialize)]
pub struct AdminCommentList {
    pub comments: Vec<AdminCommentView>,
}

// Request bodies and query strings

#[derive(Debug, Default, Deserialize)]
pub struct ListPostsQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub published: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub excerpt: Option<String>,
    pub category_id: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub featured: bool,
}

// Same shape as creation; the whole post is replaced
pub type UpdatePostRequest = CreatePostRequest;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub content: String,
    pub parent_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}
