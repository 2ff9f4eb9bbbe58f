//! GraphQL types for links, users, votes and the feed

use async_graphql::{Enum, InputObject, Scalar, ScalarType, SimpleObject, Value, ID};
use chrono::{DateTime as ChronoDateTime, Utc};
use serde::{Deserialize, Serialize};

/// DateTime scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime(pub ChronoDateTime<Utc>);

impl DateTime {
    pub fn now() -> Self {
        DateTime(Utc::now())
    }
}

impl From<ChronoDateTime<Utc>> for DateTime {
    fn from(value: ChronoDateTime<Utc>) -> Self {
        DateTime(value)
    }
}

#[Scalar]
impl ScalarType for DateTime {
    fn parse(value: Value) -> async_graphql::InputValueResult<Self> {
        if let Value::String(s) = value {
            Ok(DateTime(
                ChronoDateTime::parse_from_rfc3339(&s)
                    .map_err(|e| format!("Invalid DateTime: {}", e))?
                    .with_timezone(&Utc),
            ))
        } else {
            Err("Expected string for DateTime".into())
        }
    }

    fn to_value(&self) -> Value {
        Value::String(self.0.to_rfc3339())
    }
}

/// A posted link
#[derive(SimpleObject, Debug, Clone, PartialEq)]
#[graphql(complex)]
pub struct Link {
    pub id: i32,
    pub description: String,
    pub url: String,
    pub created_at: DateTime,
    /// Owning user, resolved through `postedBy`
    #[graphql(skip)]
    pub posted_by_id: Option<i32>,
}

/// A registered user
#[derive(SimpleObject, Debug, Clone, PartialEq, Eq)]
#[graphql(complex)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
}

/// Result of a vote: the link after the vote and the voting user
#[derive(SimpleObject, Debug, Clone)]
pub struct Vote {
    pub link: Link,
    pub user: User,
}

/// Paginated view over links
#[derive(SimpleObject, Debug, Clone)]
pub struct Feed {
    /// Opaque key derived from the query arguments
    pub id: ID,
    pub links: Vec<Link>,
    /// Number of links matching the filter, ignoring skip/take
    pub count: i32,
}

/// Sort direction
#[derive(Enum, Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[graphql(rename_items = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Sort {
    Asc,
    Desc,
}

/// One ordering key for the feed. Exactly one field must be set.
#[derive(InputObject, Debug, Clone, Default)]
pub struct LinkOrderByInput {
    pub description: Option<Sort>,
    pub url: Option<Sort>,
    pub created_at: Option<Sort>,
}
