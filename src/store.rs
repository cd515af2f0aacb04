use std::collections::{HashSet, VecDeque};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Category, Comment, Post, PostFilter, User};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("slug already in use: {0}")]
    DuplicateSlug(String),

    #[error("record {0} disappeared during update")]
    MissingRecord(Uuid),
}

pub type StoreResult<T> = Result<T, StoreError>;

// Tables keyed by id, slug indexes kept unique through the entry API
#[derive(Default)]
pub struct Store {
    users: DashMap<Uuid, User>,
    posts: DashMap<Uuid, Post>,
    post_slugs: DashMap<String, Uuid>,
    categories: DashMap<Uuid, Category>,
    category_slugs: DashMap<String, Uuid>,
    comments: DashMap<Uuid, Comment>,
}

// Claim `slug` for `id` in a unique index
fn reserve_slug(index: &DashMap<String, Uuid>, slug: &str, id: Uuid) -> StoreResult<()> {
    match index.entry(slug.to_string()) {
        Entry::Occupied(e) if *e.get() != id => Err(StoreError::DuplicateSlug(slug.to_string())),
        Entry::Occupied(_) => Ok(()),
        Entry::Vacant(e) => {
            e.insert(id);
            Ok(())
        }
    }
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // Users

    pub fn insert_user(&self, user: User) -> User {
        self.users.insert(user.id, user.clone());
        user
    }

    pub fn user(&self, id: Uuid) -> Option<User> {
        self.users.get(&id).map(|u| u.clone())
    }

    // Posts

    pub fn post_slug_exists(&self, slug: &str) -> StoreResult<bool> {
        Ok(self.post_slugs.contains_key(slug))
    }

    pub fn insert_post(&self, post: Post) -> StoreResult<Post> {
        reserve_slug(&self.post_slugs, &post.slug, post.id)?;
        self.posts.insert(post.id, post.clone());
        Ok(post)
    }

    pub fn post(&self, id: Uuid) -> Option<Post> {
        self.posts.get(&id).map(|p| p.clone())
    }

    pub fn post_by_slug(&self, slug: &str) -> Option<Post> {
        let id = *self.post_slugs.get(slug)?;
        self.post(id)
    }

    // Moves the slug in the index when it changed
    pub fn update_post(&self, post: Post) -> StoreResult<Post> {
        let old_slug = self
            .posts
            .get(&post.id)
            .map(|p| p.slug.clone())
            .ok_or(StoreError::MissingRecord(post.id))?;

        if old_slug != post.slug {
            reserve_slug(&self.post_slugs, &post.slug, post.id)?;
            self.post_slugs.remove_if(&old_slug, |_, id| *id == post.id);
        }

        self.posts.insert(post.id, post.clone());
        Ok(post)
    }

    // Newest first by publish time, drafts by creation time
    pub fn posts(&self, filter: &PostFilter) -> Vec<Post> {
        let mut matching: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| filter.matches(p))
            .map(|p| p.clone())
            .collect();
        matching.sort_by(|a, b| {
            let key = |p: &Post| p.published_at.unwrap_or(p.created_at);
            key(b).cmp(&key(a))
        });
        matching
    }

    pub fn delete_post(&self, id: Uuid) -> Option<Post> {
        let (_, post) = self.posts.remove(&id)?;
        self.post_slugs.remove_if(&post.slug, |_, owner| *owner == id);
        self.comments.retain(|_, c| c.post_id != id);
        Some(post)
    }

    // Categories

    pub fn category_slug_exists(&self, slug: &str) -> StoreResult<bool> {
        Ok(self.category_slugs.contains_key(slug))
    }

    pub fn insert_category(&self, category: Category) -> StoreResult<Category> {
        reserve_slug(&self.category_slugs, &category.slug, category.id)?;
        self.categories.insert(category.id, category.clone());
        Ok(category)
    }

    pub fn category(&self, id: Uuid) -> Option<Category> {
        self.categories.get(&id).map(|c| c.clone())
    }

    pub fn category_by_slug(&self, slug: &str) -> Option<Category> {
        let id = *self.category_slugs.get(slug)?;
        self.category(id)
    }

    pub fn categories(&self) -> Vec<Category> {
        let mut all: Vec<Category> = self.categories.iter().map(|c| c.clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    // Comments

    pub fn insert_comment(&self, comment: Comment) -> Comment {
        self.comments.insert(comment.id, comment.clone());
        comment
    }

    pub fn comment(&self, id: Uuid) -> Option<Comment> {
        self.comments.get(&id).map(|c| c.clone())
    }

    // Removes the whole subtree under `id`
    pub fn delete_comment(&self, id: Uuid) -> Option<Comment> {
        let (_, comment) = self.comments.remove(&id)?;

        let mut doomed = HashSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(parent) = queue.pop_front() {
            let children: Vec<Uuid> = self
                .comments
                .iter()
                .filter(|c| c.parent_id == Some(parent))
                .map(|c| c.id)
                .collect();
            for child in children {
                if doomed.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        if !doomed.is_empty() {
            self.comments.retain(|cid, _| !doomed.contains(cid));
        }
        Some(comment)
    }

    // Every comment, newest first
    pub fn all_comments(&self) -> Vec<Comment> {
        let mut all: Vec<Comment> = self.comments.iter().map(|c| c.clone()).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    pub fn comments_for_post(&self, post_id: Uuid) -> Vec<Comment> {
        self.comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| c.clone())
            .collect()
    }
}
