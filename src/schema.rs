//! GraphQL schema: feed and users queries, link and vote mutations

use async_graphql::{
    ComplexObject, Context, EmptySubscription, ErrorExtensions, Object, Result as GqlResult,
    Schema, ID,
};

use crate::auth::require_user_id;
use crate::pagination::{count_to_int, FeedQuery};
use crate::store::{NewLink, SharedStore};
use crate::types::{Feed, Link, LinkOrderByInput, User, Vote};

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the schema over a store
pub fn build_schema(store: SharedStore) -> AppSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(store)
        .finish()
}

fn store<'a>(ctx: &'a Context<'_>) -> GqlResult<&'a SharedStore> {
    ctx.data::<SharedStore>()
}

// ============================================================================
// QUERY ROOT
// ============================================================================

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Links matching `filter` (substring of description or url), ordered by
    /// `orderBy`, then windowed by `skip`/`take`. `count` ignores the window.
    async fn feed(
        &self,
        ctx: &Context<'_>,
        filter: Option<String>,
        skip: Option<i32>,
        take: Option<i32>,
        order_by: Option<Vec<LinkOrderByInput>>,
    ) -> GqlResult<Feed> {
        let query = FeedQuery::from_args(filter, skip, take, order_by).map_err(|e| e.extend())?;
        let page = store(ctx)?.feed(&query).await.map_err(|e| e.extend())?;
        let id = query.feed_id().map_err(|e| e.extend())?;
        let count = count_to_int(page.count).map_err(|e| e.extend())?;

        tracing::debug!(
            count = page.count,
            returned = page.links.len(),
            "Feed resolved"
        );

        Ok(Feed {
            id: ID(id),
            links: page.links,
            count,
        })
    }

    async fn users(&self, ctx: &Context<'_>) -> GqlResult<Vec<User>> {
        store(ctx)?.users().await.map_err(|e| e.extend())
    }
}

// ============================================================================
// MUTATION ROOT
// ============================================================================

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Create a link owned by the authenticated caller
    async fn post(&self, ctx: &Context<'_>, description: String, url: String) -> GqlResult<Link> {
        let user_id = require_user_id(ctx, "post").map_err(|e| e.extend())?;
        let link = store(ctx)?
            .create_link(NewLink {
                description,
                url,
                posted_by_id: user_id,
            })
            .await
            .map_err(|e| e.extend())?;

        tracing::info!(link_id = link.id, user_id, "Link posted");
        Ok(link)
    }

    // TODO: update and delete take no identity; decide whether only the owner may change a link
    async fn update(
        &self,
        ctx: &Context<'_>,
        id: i32,
        url: String,
        description: String,
    ) -> GqlResult<Link> {
        let link = store(ctx)?
            .update_link(id, &description, &url)
            .await
            .map_err(|e| e.extend())?;

        tracing::info!(link_id = id, "Link updated");
        Ok(link)
    }

    /// Delete a link, returning it as it was
    async fn delete(&self, ctx: &Context<'_>, id: i32) -> GqlResult<Link> {
        let link = store(ctx)?.delete_link(id).await.map_err(|e| e.extend())?;

        tracing::info!(link_id = id, "Link deleted");
        Ok(link)
    }

    /// Add the caller to the link's voters
    async fn vote(&self, ctx: &Context<'_>, link_id: i32) -> GqlResult<Vote> {
        let user_id = require_user_id(ctx, "vote").map_err(|e| e.extend())?;
        let (link, user) = store(ctx)?
            .add_vote(link_id, user_id)
            .await
            .map_err(|e| e.extend())?;

        tracing::info!(link_id, user_id, "Vote recorded");
        Ok(Vote { link, user })
    }
}

// ============================================================================
// RELATIONS
// ============================================================================

#[ComplexObject]
impl Link {
    async fn posted_by(&self, ctx: &Context<'_>) -> GqlResult<Option<User>> {
        store(ctx)?.link_owner(self.id).await.map_err(|e| e.extend())
    }

    async fn voters(&self, ctx: &Context<'_>) -> GqlResult<Vec<User>> {
        store(ctx)?.link_voters(self.id).await.map_err(|e| e.extend())
    }
}

#[ComplexObject]
impl User {
    async fn links(&self, ctx: &Context<'_>) -> GqlResult<Vec<Link>> {
        store(ctx)?.user_links(self.id).await.map_err(|e| e.extend())
    }

    async fn votes(&self, ctx: &Context<'_>) -> GqlResult<Vec<Link>> {
        store(ctx)?.user_votes(self.id).await.map_err(|e| e.extend())
    }
}
