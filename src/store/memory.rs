//! In-memory link store

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{FeedPage, LinkStore, NewLink};
use crate::pagination::FeedQuery;
use crate::types::{DateTime, Link, User};
use crate::{ApiError, Result};

#[derive(Default)]
struct State {
    links: BTreeMap<i32, Link>,
    users: BTreeMap<i32, User>,
    /// (link_id, user_id)
    votes: BTreeSet<(i32, i32)>,
    next_link_id: i32,
    next_user_id: i32,
}

impl State {
    fn link(&self, id: i32) -> Result<&Link> {
        self.links
            .get(&id)
            .ok_or(ApiError::NotFound { entity: "link", id })
    }

    fn user(&self, id: i32) -> Result<&User> {
        self.users
            .get(&id)
            .ok_or(ApiError::NotFound { entity: "user", id })
    }
}

/// Store held entirely in process memory. Ids start at 1.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn feed(&self, query: &FeedQuery) -> Result<FeedPage> {
        let state = self.state.lock().await;
        let mut matched: Vec<Link> = state
            .links
            .values()
            .filter(|link| query.matches(link))
            .cloned()
            .collect();
        matched.sort_by(|a, b| query.compare(a, b));

        let count = matched.len() as i64;
        Ok(FeedPage {
            links: query.window(matched),
            count,
        })
    }

    async fn users(&self) -> Result<Vec<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().cloned().collect())
    }

    async fn user(&self, id: i32) -> Result<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn create_user(&self, name: &str, email: &str) -> Result<User> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.email == email) {
            return Err(ApiError::InvalidArgument(format!("email '{}' already registered", email)));
        }
        state.next_user_id += 1;
        let user = User {
            id: state.next_user_id,
            name: name.to_string(),
            email: email.to_string(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn create_link(&self, link: NewLink) -> Result<Link> {
        let mut state = self.state.lock().await;
        state.user(link.posted_by_id)?;
        state.next_link_id += 1;
        let created = Link {
            id: state.next_link_id,
            description: link.description,
            url: link.url,
            created_at: DateTime::now(),
            posted_by_id: Some(link.posted_by_id),
        };
        state.links.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_link(&self, id: i32, description: &str, url: &str) -> Result<Link> {
        let mut state = self.state.lock().await;
        let link = state
            .links
            .get_mut(&id)
            .ok_or(ApiError::NotFound { entity: "link", id })?;
        link.description = description.to_string();
        link.url = url.to_string();
        Ok(link.clone())
    }

    async fn delete_link(&self, id: i32) -> Result<Link> {
        let mut state = self.state.lock().await;
        let removed = state
            .links
            .remove(&id)
            .ok_or(ApiError::NotFound { entity: "link", id })?;
        state.votes.retain(|(link_id, _)| *link_id != id);
        Ok(removed)
    }

    async fn link_owner(&self, link_id: i32) -> Result<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .links
            .get(&link_id)
            .and_then(|link| link.posted_by_id)
            .and_then(|owner| state.users.get(&owner).cloned()))
    }

    async fn link_voters(&self, link_id: i32) -> Result<Vec<User>> {
        let state = self.state.lock().await;
        Ok(state
            .votes
            .range((link_id, i32::MIN)..=(link_id, i32::MAX))
            .filter_map(|(_, user_id)| state.users.get(user_id).cloned())
            .collect())
    }

    async fn user_links(&self, user_id: i32) -> Result<Vec<Link>> {
        let state = self.state.lock().await;
        Ok(state
            .links
            .values()
            .filter(|link| link.posted_by_id == Some(user_id))
            .cloned()
            .collect())
    }

    async fn user_votes(&self, user_id: i32) -> Result<Vec<Link>> {
        let state = self.state.lock().await;
        Ok(state
            .votes
            .iter()
            .filter(|(_, voter)| *voter == user_id)
            .filter_map(|(link_id, _)| state.links.get(link_id).cloned())
            .collect())
    }

    async fn add_vote(&self, link_id: i32, user_id: i32) -> Result<(Link, User)> {
        let mut state = self.state.lock().await;
        let link = state.link(link_id)?.clone();
        let user = state.user(user_id)?.clone();
        state.votes.insert((link_id, user_id));
        Ok((link, user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::{OrderField, OrderKey};
    use crate::types::Sort;

    async fn seeded() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = store.create_user("alice", "alice@example.com").await.unwrap();
        for (description, url) in [
            ("Fullstack tutorial for GraphQL", "www.howtographql.com"),
            ("Rust book", "doc.rust-lang.org"),
            ("Prisma docs", "www.prisma.io/graphql"),
            ("Tokio guide", "tokio.rs"),
        ] {
            store
                .create_link(NewLink {
                    description: description.to_string(),
                    url: url.to_string(),
                    posted_by_id: user.id,
                })
                .await
                .unwrap();
        }
        (store, user)
    }

    #[tokio::test]
    async fn test_feed_filter_and_count() {
        let (store, _) = seeded().await;
        let query = FeedQuery {
            filter: Some("GraphQL".to_string()),
            ..Default::default()
        };
        let page = store.feed(&query).await.unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.links.len(), 1);
        assert_eq!(page.links[0].url, "www.howtographql.com");

        let lower = FeedQuery {
            filter: Some("graphql".to_string()),
            ..Default::default()
        };
        let page = store.feed(&lower).await.unwrap();
        assert_eq!(page.count, 2);
        for link in &page.links {
            assert!(link.description.contains("graphql") || link.url.contains("graphql"));
        }
    }

    #[tokio::test]
    async fn test_feed_count_ignores_pagination() {
        let (store, _) = seeded().await;
        for (skip, take) in [(None, None), (Some(1), Some(1)), (Some(3), Some(5)), (Some(10), None)] {
            let query = FeedQuery {
                skip,
                take,
                ..Default::default()
            };
            assert_eq!(store.feed(&query).await.unwrap().count, 4);
        }
    }

    #[tokio::test]
    async fn test_feed_skip_take_over_ordering() {
        let (store, _) = seeded().await;
        let order_by = vec![OrderKey { field: OrderField::Description, direction: Sort::Asc }];
        let full = store
            .feed(&FeedQuery { order_by: order_by.clone(), ..Default::default() })
            .await
            .unwrap();
        let page = store
            .feed(&FeedQuery {
                skip: Some(1),
                take: Some(2),
                order_by,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.links, full.links[1..3].to_vec());
    }

    #[tokio::test]
    async fn test_vote_is_idempotent() {
        let (store, user) = seeded().await;
        store.add_vote(1, user.id).await.unwrap();
        store.add_vote(1, user.id).await.unwrap();
        assert_eq!(store.link_voters(1).await.unwrap(), vec![user.clone()]);
        assert_eq!(store.user_votes(user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_vote_missing_link() {
        let (store, user) = seeded().await;
        let err = store.add_vote(99, user.id).await.unwrap_err();
        assert_eq!(err, ApiError::NotFound { entity: "link", id: 99 });
    }

    #[tokio::test]
    async fn test_delete_missing_leaves_store_unchanged() {
        let (store, _) = seeded().await;
        let before = store.feed(&FeedQuery::default()).await.unwrap();
        let err = store.delete_link(42).await.unwrap_err();
        assert_eq!(err, ApiError::NotFound { entity: "link", id: 42 });
        let after = store.feed(&FeedQuery::default()).await.unwrap();
        assert_eq!(before.links, after.links);
    }

    #[tokio::test]
    async fn test_delete_returns_prior_state_and_drops_votes() {
        let (store, user) = seeded().await;
        store.add_vote(2, user.id).await.unwrap();
        let deleted = store.delete_link(2).await.unwrap();
        assert_eq!(deleted.description, "Rust book");
        assert!(store.user_votes(user.id).await.unwrap().is_empty());
        assert_eq!(store.feed(&FeedQuery::default()).await.unwrap().count, 3);
    }

    #[tokio::test]
    async fn test_create_link_requires_existing_owner() {
        let store = MemoryStore::new();
        let err = store
            .create_link(NewLink {
                description: "orphan".to_string(),
                url: "example.com".to_string(),
                posted_by_id: 5,
            })
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::NotFound { entity: "user", id: 5 });
    }

    #[test]
    fn test_relations_resolve_by_parent_id() {
        tokio_test::block_on(async {
            let (store, user) = seeded().await;
            assert_eq!(store.link_owner(1).await.unwrap(), Some(user.clone()));
            assert_eq!(store.link_owner(100).await.unwrap(), None);
            assert_eq!(store.user_links(user.id).await.unwrap().len(), 4);
        });
    }
}
