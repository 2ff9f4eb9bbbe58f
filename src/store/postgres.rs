//! PostgreSQL link store

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime as ChronoDateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{FeedPage, LinkStore, NewLink};
use crate::config::AppConfig;
use crate::pagination::{FeedQuery, OrderKey};
use crate::types::{Link, Sort, User};
use crate::{ApiError, Result};

const SCHEMA: &str = include_str!("../../migrations/0001_links.sql");

#[derive(sqlx::FromRow, Debug)]
struct LinkRow {
    id: i32,
    description: String,
    url: String,
    created_at: ChronoDateTime<Utc>,
    posted_by_id: Option<i32>,
}

impl From<LinkRow> for Link {
    fn from(row: LinkRow) -> Self {
        Link {
            id: row.id,
            description: row.description,
            url: row.url,
            created_at: row.created_at.into(),
            posted_by_id: row.posted_by_id,
        }
    }
}

#[derive(sqlx::FromRow, Debug)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
        }
    }
}

/// Create a connection pool from configuration
pub async fn create_pool(config: &AppConfig, database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await?;

    tracing::info!(
        max_connections = config.max_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

/// Store backed by PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if missing
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Database schema applied");
        Ok(())
    }
}

/// Escape `LIKE` wildcards so the filter is a literal substring
fn like_pattern(filter: &str) -> String {
    let mut pattern = String::with_capacity(filter.len() + 2);
    pattern.push('%');
    for c in filter.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn order_clause(keys: &[OrderKey]) -> String {
    keys.iter()
        .map(|key| {
            let direction = match key.direction {
                Sort::Asc => "ASC",
                Sort::Desc => "DESC",
            };
            format!("{} {}", key.field.column(), direction)
        })
        .chain(std::iter::once("id ASC".to_string()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn push_filter(builder: &mut QueryBuilder<'static, Postgres>, query: &FeedQuery) {
    if let Some(filter) = query.filter.as_deref() {
        let pattern = like_pattern(filter);
        builder
            .push(" WHERE (description LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR url LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
}

fn feed_select(query: &FeedQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder =
        QueryBuilder::new("SELECT id, description, url, created_at, posted_by_id FROM links");
    push_filter(&mut builder, query);
    builder.push(" ORDER BY ").push(order_clause(&query.order_by));
    if let Some(skip) = query.skip {
        builder.push(" OFFSET ").push_bind(i64::from(skip));
    }
    if let Some(take) = query.take {
        builder.push(" LIMIT ").push_bind(i64::from(take));
    }
    builder
}

fn feed_count(query: &FeedQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM links");
    push_filter(&mut builder, query);
    builder
}

#[async_trait]
impl LinkStore for PgStore {
    async fn feed(&self, query: &FeedQuery) -> Result<FeedPage> {
        let mut select = feed_select(query);
        let mut count = feed_count(query);

        let (rows, count) = tokio::try_join!(
            select.build_query_as::<LinkRow>().fetch_all(&self.pool),
            count.build_query_scalar::<i64>().fetch_one(&self.pool),
        )?;

        Ok(FeedPage {
            links: rows.into_iter().map(Link::from).collect(),
            count,
        })
    }

    async fn users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT id, name, email FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn user(&self, id: i32) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, name, email FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn create_user(&self, name: &str, email: &str) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (name, email)
            VALUES ($1, $2)
            RETURNING id, name, email
            "#,
        )
        .bind(name)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|db| db.is_unique_violation()) {
                ApiError::InvalidArgument(format!("email '{}' already registered", email))
            } else {
                e.into()
            }
        })?;
        Ok(row.into())
    }

    async fn create_link(&self, link: NewLink) -> Result<Link> {
        let owner = link.posted_by_id;
        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            INSERT INTO links (description, url, posted_by_id)
            VALUES ($1, $2, $3)
            RETURNING id, description, url, created_at, posted_by_id
            "#,
        )
        .bind(link.description)
        .bind(link.url)
        .bind(owner)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|db| db.is_foreign_key_violation()) {
                ApiError::NotFound { entity: "user", id: owner }
            } else {
                e.into()
            }
        })?;
        Ok(row.into())
    }

    async fn update_link(&self, id: i32, description: &str, url: &str) -> Result<Link> {
        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            UPDATE links
            SET description = $2, url = $3
            WHERE id = $1
            RETURNING id, description, url, created_at, posted_by_id
            "#,
        )
        .bind(id)
        .bind(description)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Link::from)
            .ok_or(ApiError::NotFound { entity: "link", id })
    }

    async fn delete_link(&self, id: i32) -> Result<Link> {
        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            DELETE FROM links
            WHERE id = $1
            RETURNING id, description, url, created_at, posted_by_id
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Link::from)
            .ok_or(ApiError::NotFound { entity: "link", id })
    }

    async fn link_owner(&self, link_id: i32) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT u.id, u.name, u.email
            FROM links l
            JOIN users u ON u.id = l.posted_by_id
            WHERE l.id = $1
            "#,
        )
        .bind(link_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn link_voters(&self, link_id: i32) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT u.id, u.name, u.email
            FROM link_voters v
            JOIN users u ON u.id = v.user_id
            WHERE v.link_id = $1
            ORDER BY u.id
            "#,
        )
        .bind(link_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn user_links(&self, user_id: i32) -> Result<Vec<Link>> {
        let rows = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, description, url, created_at, posted_by_id
            FROM links
            WHERE posted_by_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Link::from).collect())
    }

    async fn user_votes(&self, user_id: i32) -> Result<Vec<Link>> {
        let rows = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT l.id, l.description, l.url, l.created_at, l.posted_by_id
            FROM link_voters v
            JOIN links l ON l.id = v.link_id
            WHERE v.user_id = $1
            ORDER BY l.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Link::from).collect())
    }

    async fn add_vote(&self, link_id: i32, user_id: i32) -> Result<(Link, User)> {
        let mut tx = self.pool.begin().await?;

        // holds off a concurrent delete until commit
        let link = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT id, description, url, created_at, posted_by_id
            FROM links
            WHERE id = $1
            FOR KEY SHARE
            "#,
        )
        .bind(link_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound { entity: "link", id: link_id })?;

        let user = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email FROM users WHERE id = $1 FOR KEY SHARE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound { entity: "user", id: user_id })?;

        sqlx::query(
            r#"
            INSERT INTO link_voters (link_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(link_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|db| db.is_foreign_key_violation()) {
                ApiError::NotFound { entity: "link", id: link_id }
            } else {
                e.into()
            }
        })?;

        tx.commit().await?;
        Ok((link.into(), user.into()))
    }
}
