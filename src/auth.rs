//! Bearer token authentication and per-request identity
//!
//! Provides helpers for:
//! - Decoding the `Authorization: Bearer <jwt>` header into an [`AuthClaim`]
//! - Issuing tokens signed with the shared secret
//! - An Axum handler that injects the claim into the GraphQL request
//! - Reading the claim back inside resolvers

use async_graphql::{Context, ErrorExtensions, Pos, Request, Response, Schema};
use axum::{
    extract::Extension,
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{ApiError, Result};

const BEARER_PREFIX: &str = "Bearer ";

/// Identity decoded from a verified token. Lives for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthClaim {
    pub user_id: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    #[serde(rename = "userId")]
    user_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
}

/// HS256 signing and verification keys derived from the shared secret
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is optional; when present it is still checked
        validation.required_spec_claims.clear();

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign a token carrying `userId`
    pub fn issue(&self, user_id: i32, expires_at: Option<DateTime<Utc>>) -> Result<String> {
        let payload = TokenPayload {
            user_id,
            exp: expires_at.map(|at| at.timestamp()),
        };
        encode(&Header::new(Algorithm::HS256), &payload, &self.encoding)
            .map_err(|e| ApiError::Internal(e.to_string()))
    }

    /// Verify a bare token
    pub fn verify(&self, token: &str) -> Result<AuthClaim> {
        let data = decode::<TokenPayload>(token, &self.decoding, &self.validation)
            .map_err(|e| ApiError::InvalidCredential(e.to_string()))?;
        Ok(AuthClaim {
            user_id: data.claims.user_id,
        })
    }

    /// Decode a raw `Authorization` header value
    ///
    /// Absent header means anonymous (`Ok(None)`). A present header must hold
    /// a non-empty, verifiable token.
    pub fn decode_auth_header(&self, header: Option<&str>) -> Result<Option<AuthClaim>> {
        let Some(header) = header else {
            return Ok(None);
        };
        let token = header.strip_prefix(BEARER_PREFIX).unwrap_or(header).trim();
        if token.is_empty() {
            return Err(ApiError::InvalidCredential("No token found".to_string()));
        }
        self.verify(token).map(Some)
    }

    /// Decode the claim from request headers
    pub fn claim_from_headers(&self, headers: &HeaderMap) -> Result<Option<AuthClaim>> {
        let header = headers
            .get(AUTHORIZATION)
            .map(|v| {
                v.to_str()
                    .map_err(|_| ApiError::InvalidCredential("Authorization header is not valid text".to_string()))
            })
            .transpose()?;
        self.decode_auth_header(header)
    }
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys").finish_non_exhaustive()
    }
}

/// GraphQL handler with authentication context injection
///
/// A valid bearer token adds an [`AuthClaim`] to the request data. No header
/// runs the request anonymously. An invalid token fails the whole request.
///
/// # Example
///
/// ```rust,no_run
/// use axum::{Router, routing::post, Extension};
/// use links_graphql::auth::{graphql_handler, TokenKeys};
/// use links_graphql::{MutationRoot, QueryRoot};
/// use async_graphql::EmptySubscription;
///
/// let app: Router = Router::new()
///     .route("/graphql", post(graphql_handler::<QueryRoot, MutationRoot, EmptySubscription>))
///     .layer(Extension(TokenKeys::from_secret(b"secret")));
/// ```
pub async fn graphql_handler<Query, Mutation, Subscription>(
    Extension(schema): Extension<Schema<Query, Mutation, Subscription>>,
    Extension(keys): Extension<TokenKeys>,
    headers: HeaderMap,
    req: Json<Request>,
) -> Json<Response>
where
    Query: async_graphql::ObjectType + 'static,
    Mutation: async_graphql::ObjectType + 'static,
    Subscription: async_graphql::SubscriptionType + 'static,
{
    let mut request = req.0;

    match keys.claim_from_headers(&headers) {
        Ok(Some(claim)) => request = request.data(claim),
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(error = %err, "Rejecting request with invalid credential");
            let error = err.extend().into_server_error(Pos::default());
            return Json(Response::from_errors(vec![error]));
        }
    }

    Json(schema.execute(request).await)
}

/// Get the caller's claim from GraphQL context
pub fn get_auth_claim(ctx: &Context<'_>) -> Option<AuthClaim> {
    ctx.data_opt::<AuthClaim>().copied()
}

/// Get the caller's user id or fail with `Unauthenticated`
///
/// `action` completes the message "Cannot {action} without logging in."
pub fn require_user_id(ctx: &Context<'_>, action: &str) -> Result<i32> {
    get_auth_claim(ctx)
        .map(|claim| claim.user_id)
        .ok_or_else(|| ApiError::Unauthenticated(format!("Cannot {} without logging in.", action)))
}
