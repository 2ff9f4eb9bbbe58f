//! Persistence for links, users and votes
//!
//! Relations (`postedBy`, `voters`, a user's links and votes) are explicit
//! queries keyed by the parent's id.

use std::sync::Arc;

use async_trait::async_trait;

use crate::pagination::FeedQuery;
use crate::types::{Link, User};
use crate::Result;

pub mod memory;
pub mod postgres;

/// One page of the feed plus the filter-only match count
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub links: Vec<Link>,
    pub count: i64,
}

/// Fields of a link created by `post`
#[derive(Debug, Clone)]
pub struct NewLink {
    pub description: String,
    pub url: String,
    pub posted_by_id: i32,
}

/// A user created at startup when missing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedUser {
    pub name: String,
    pub email: String,
}

/// Create each seed user whose email is not registered yet.
///
/// Returns the seeded users in order, whether created now or already present.
pub async fn seed_users(store: &dyn LinkStore, seeds: &[SeedUser]) -> Result<Vec<User>> {
    let mut existing = store.users().await?;
    let mut seeded = Vec::with_capacity(seeds.len());
    for seed in seeds {
        let user = match existing.iter().find(|u| u.email == seed.email) {
            Some(user) => user.clone(),
            None => {
                let user = store.create_user(&seed.name, &seed.email).await?;
                tracing::info!(user_id = user.id, email = %user.email, "Seeded user");
                existing.push(user.clone());
                user
            }
        };
        seeded.push(user);
    }
    Ok(seeded)
}

/// Store shared across resolvers
pub type SharedStore = Arc<dyn LinkStore>;

/// Link and user storage
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Filter, order, skip, take; count before skip/take
    async fn feed(&self, query: &FeedQuery) -> Result<FeedPage>;

    /// All users ordered by id
    async fn users(&self) -> Result<Vec<User>>;

    async fn user(&self, id: i32) -> Result<Option<User>>;

    async fn create_user(&self, name: &str, email: &str) -> Result<User>;

    /// Fails with `NotFound` if the owner does not exist
    async fn create_link(&self, link: NewLink) -> Result<Link>;

    async fn update_link(&self, id: i32, description: &str, url: &str) -> Result<Link>;

    /// Returns the link as it was before deletion
    async fn delete_link(&self, id: i32) -> Result<Link>;

    async fn link_owner(&self, link_id: i32) -> Result<Option<User>>;

    async fn link_voters(&self, link_id: i32) -> Result<Vec<User>>;

    async fn user_links(&self, user_id: i32) -> Result<Vec<Link>>;

    async fn user_votes(&self, user_id: i32) -> Result<Vec<Link>>;

    /// Adds the user to the link's voter set. Voting twice is a no-op.
    async fn add_vote(&self, link_id: i32, user_id: i32) -> Result<(Link, User)>;
}
