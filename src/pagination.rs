//! Feed filtering, ordering and skip/take pagination

use std::cmp::Ordering;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::types::{Link, LinkOrderByInput, Sort};
use crate::{ApiError, Result};

/// Prefix of every feed id
pub const FEED_ID_PREFIX: &str = "main-feed:";

/// Link field the feed can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderField {
    Description,
    Url,
    CreatedAt,
}

impl OrderField {
    /// Column backing this field in the `links` table
    pub fn column(self) -> &'static str {
        match self {
            OrderField::Description => "description",
            OrderField::Url => "url",
            OrderField::CreatedAt => "created_at",
        }
    }

    fn compare(self, a: &Link, b: &Link) -> Ordering {
        match self {
            OrderField::Description => a.description.cmp(&b.description),
            OrderField::Url => a.url.cmp(&b.url),
            OrderField::CreatedAt => a.created_at.cmp(&b.created_at),
        }
    }
}

/// A single (field, direction) ordering key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderKey {
    pub field: OrderField,
    pub direction: Sort,
}

impl TryFrom<&LinkOrderByInput> for OrderKey {
    type Error = ApiError;

    fn try_from(input: &LinkOrderByInput) -> Result<Self> {
        let set: Vec<OrderKey> = [
            (OrderField::Description, input.description),
            (OrderField::Url, input.url),
            (OrderField::CreatedAt, input.created_at),
        ]
        .into_iter()
        .filter_map(|(field, direction)| direction.map(|direction| OrderKey { field, direction }))
        .collect();

        match set.as_slice() {
            [key] => Ok(*key),
            _ => Err(ApiError::InvalidArgument(
                "each 'orderBy' entry must set exactly one field".to_string(),
            )),
        }
    }
}

/// Validated feed arguments
///
/// Applied as filter, then order, then skip, then take. The total count only
/// reflects the filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub filter: Option<String>,
    pub skip: Option<u32>,
    pub take: Option<u32>,
    pub order_by: Vec<OrderKey>,
}

impl FeedQuery {
    /// Build from raw GraphQL arguments
    pub fn from_args(
        filter: Option<String>,
        skip: Option<i32>,
        take: Option<i32>,
        order_by: Option<Vec<LinkOrderByInput>>,
    ) -> Result<Self> {
        let order_by = order_by
            .unwrap_or_default()
            .iter()
            .map(OrderKey::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            filter,
            skip: non_negative("skip", skip)?,
            take: non_negative("take", take)?,
            order_by,
        })
    }

    /// Opaque, deterministic id for this argument set
    pub fn feed_id(&self) -> Result<String> {
        Ok(format!("{}{}", FEED_ID_PREFIX, FeedIdCodec::encode(self)?))
    }

    /// Whether a link passes the filter (case-sensitive substring)
    pub fn matches(&self, link: &Link) -> bool {
        match self.filter.as_deref() {
            Some(needle) => link.description.contains(needle) || link.url.contains(needle),
            None => true,
        }
    }

    /// Ordering over links: requested keys first, then ascending id
    pub fn compare(&self, a: &Link, b: &Link) -> Ordering {
        self.order_by
            .iter()
            .map(|key| {
                let ord = key.field.compare(a, b);
                match key.direction {
                    Sort::Asc => ord,
                    Sort::Desc => ord.reverse(),
                }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| a.id.cmp(&b.id))
    }

    /// Apply skip and take to an already filtered and ordered sequence
    pub fn window<T>(&self, items: Vec<T>) -> Vec<T> {
        let skip = self.skip.unwrap_or(0) as usize;
        let iter = items.into_iter().skip(skip);
        match self.take {
            Some(take) => iter.take(take as usize).collect(),
            None => iter.collect(),
        }
    }
}

fn non_negative(name: &str, value: Option<i32>) -> Result<Option<u32>> {
    value
        .map(|v| {
            u32::try_from(v)
                .map_err(|_| ApiError::InvalidArgument(format!("'{}' must be non-negative", name)))
        })
        .transpose()
}

/// Feed id encoding. Ids are opaque keys and are never parsed back.
pub struct FeedIdCodec;

impl FeedIdCodec {
    /// Encode a query to base64 over its canonical JSON form
    pub fn encode(query: &FeedQuery) -> Result<String> {
        let json = serde_json::to_string(query).map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok(BASE64.encode(json.as_bytes()))
    }
}

/// Convert a store count to a GraphQL `Int`
pub fn count_to_int(count: i64) -> Result<i32> {
    i32::try_from(count)
        .map_err(|_| ApiError::Internal(format!("feed count {} exceeds the GraphQL Int range", count)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DateTime;
    use chrono::{TimeZone, Utc};

    fn link(id: i32, description: &str, url: &str, minute: u32) -> Link {
        Link {
            id,
            description: description.to_string(),
            url: url.to_string(),
            created_at: DateTime(Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap()),
            posted_by_id: None,
        }
    }

    fn run(query: &FeedQuery, links: &[Link]) -> Vec<i32> {
        let mut matched: Vec<Link> = links.iter().filter(|l| query.matches(l)).cloned().collect();
        matched.sort_by(|a, b| query.compare(a, b));
        query.window(matched).into_iter().map(|l| l.id).collect()
    }

    #[test]
    fn test_filter_matches_description_or_url() {
        let query = FeedQuery {
            filter: Some("graphql".to_string()),
            ..Default::default()
        };
        assert!(query.matches(&link(1, "learn graphql", "https://a.dev", 0)));
        assert!(query.matches(&link(2, "docs", "https://graphql.org", 0)));
        assert!(!query.matches(&link(3, "Learn GraphQL", "https://b.dev", 0)));
    }

    #[test]
    fn test_skip_take_window() {
        let links: Vec<Link> = (1..=6).map(|i| link(i, "d", "u", 0)).collect();
        let query = FeedQuery {
            skip: Some(2),
            take: Some(3),
            ..Default::default()
        };
        assert_eq!(run(&query, &links), vec![3, 4, 5]);

        let tail = FeedQuery {
            skip: Some(5),
            take: Some(10),
            ..Default::default()
        };
        assert_eq!(run(&tail, &links), vec![6]);
    }

    #[test]
    fn test_multi_key_ordering_with_id_tiebreak() {
        let links = vec![
            link(1, "b", "x", 3),
            link(2, "a", "y", 1),
            link(3, "b", "z", 2),
            link(4, "a", "y", 5),
        ];
        let query = FeedQuery {
            order_by: vec![
                OrderKey { field: OrderField::Description, direction: Sort::Asc },
                OrderKey { field: OrderField::CreatedAt, direction: Sort::Desc },
            ],
            ..Default::default()
        };
        assert_eq!(run(&query, &links), vec![4, 2, 1, 3]);

        let by_url = FeedQuery {
            order_by: vec![OrderKey { field: OrderField::Url, direction: Sort::Desc }],
            ..Default::default()
        };
        assert_eq!(run(&by_url, &links), vec![3, 2, 4, 1]);
    }

    #[test]
    fn test_from_args_rejects_negative_values() {
        let err = FeedQuery::from_args(None, Some(-1), None, None).unwrap_err();
        assert_eq!(err, ApiError::InvalidArgument("'skip' must be non-negative".to_string()));
        assert!(FeedQuery::from_args(None, None, Some(-5), None).is_err());
    }

    #[test]
    fn test_order_entry_requires_exactly_one_field() {
        let empty = LinkOrderByInput::default();
        assert!(OrderKey::try_from(&empty).is_err());

        let two = LinkOrderByInput {
            description: Some(Sort::Asc),
            url: Some(Sort::Desc),
            created_at: None,
        };
        assert!(OrderKey::try_from(&two).is_err());

        let one = LinkOrderByInput {
            created_at: Some(Sort::Desc),
            ..Default::default()
        };
        assert_eq!(
            OrderKey::try_from(&one).unwrap(),
            OrderKey { field: OrderField::CreatedAt, direction: Sort::Desc }
        );
    }

    #[test]
    fn test_feed_id_is_deterministic() {
        let a = FeedQuery::from_args(Some("rust".to_string()), Some(1), Some(2), None).unwrap();
        let b = FeedQuery::from_args(Some("rust".to_string()), Some(1), Some(2), None).unwrap();
        let c = FeedQuery::from_args(Some("rust".to_string()), Some(2), Some(2), None).unwrap();

        assert_eq!(a.feed_id().unwrap(), b.feed_id().unwrap());
        assert_ne!(a.feed_id().unwrap(), c.feed_id().unwrap());
        assert!(a.feed_id().unwrap().starts_with(FEED_ID_PREFIX));

        let encoded = a.feed_id().unwrap();
        let bytes = BASE64
            .decode(encoded.strip_prefix(FEED_ID_PREFIX).unwrap())
            .unwrap();
        let decoded: FeedQuery = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, a);
    }

    #[test]
    fn test_count_to_int_rejects_overflow() {
        assert_eq!(count_to_int(42).unwrap(), 42);
        assert_eq!(count_to_int(i64::from(i32::MAX)).unwrap(), i32::MAX);

        let err = count_to_int(i64::from(i32::MAX) + 1).unwrap_err();
        assert_eq!(err.code(), "INTERNAL");
    }
}
