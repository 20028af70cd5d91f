//! HTTP clients for the identity provider and the backend service.

use amber_lantern_auth::{
    BackendService, BearerToken, IdentityProvider, ProviderError, ProviderResult, Session,
    SessionUser,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

const SIGN_IN_ANONYMOUS: &str = "api/auth/sign-in/anonymous";
const GET_SESSION: &str = "api/auth/get-session";
const BACKEND_TOKEN: &str = "api/auth/convex/token";
const VERIFY_ONE_TIME_TOKEN: &str = "api/auth/cross-domain/one-time-token/verify";
const SIGN_OUT: &str = "api/auth/sign-out";

const QUERY: &str = "api/query";
const CURRENT_SESSION_QUERY: &str = "auth:getCurrentSession";
const CURRENT_USER_QUERY: &str = "auth:getCurrentUser";
const IS_AUTHENTICATED_QUERY: &str = "auth:isAuthenticated";

fn parse_base_url(raw: &str) -> Result<Url, ProviderError> {
    // A trailing slash makes `join` append rather than replace the last segment.
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|e| ProviderError::Configuration {
        reason: format!("invalid base URL '{raw}': {e}"),
    })
}

fn endpoint_url(base: &Url, endpoint: &str) -> Result<Url, ProviderError> {
    base.join(endpoint).map_err(|e| ProviderError::Configuration {
        reason: format!("invalid endpoint '{endpoint}': {e}"),
    })
}

fn send_error(endpoint: &str, error: reqwest::Error) -> ProviderError {
    if error.is_decode() {
        ProviderError::Decode {
            endpoint: endpoint.to_string(),
            reason: error.to_string(),
        }
    } else {
        ProviderError::Network {
            endpoint: endpoint.to_string(),
            reason: error.to_string(),
        }
    }
}

async fn send(endpoint: &str, request: RequestBuilder) -> Result<Response, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| send_error(endpoint, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Rejected {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

async fn decode<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, ProviderError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    token: Option<String>,
}

impl TokenBody {
    fn into_token(self) -> Option<BearerToken> {
        self.token.as_deref().and_then(BearerToken::from_raw)
    }
}

#[derive(Debug, Deserialize)]
struct VerifiedOneTimeToken {
    session: Option<VerifiedSession>,
}

#[derive(Debug, Deserialize)]
struct VerifiedSession {
    token: Option<String>,
}

/// Client for the identity provider's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    client: Client,
    base_url: Url,
}

impl HttpIdentityProvider {
    /// Creates a client for the provider at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL.
    pub fn new(client: Client, base_url: &str) -> ProviderResult<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// Returns the provider origin.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> Result<Url, ProviderError> {
        endpoint_url(&self.base_url, endpoint)
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn sign_in_anonymous(&self) -> ProviderResult<Option<BearerToken>> {
        let request = self
            .client
            .post(self.url(SIGN_IN_ANONYMOUS)?)
            .json(&serde_json::json!({}));
        let response = send(SIGN_IN_ANONYMOUS, request).await?;
        let body: TokenBody = decode(SIGN_IN_ANONYMOUS, response).await?;
        Ok(body.into_token())
    }

    async fn session(
        &self,
        token: &BearerToken,
    ) -> ProviderResult<Option<Session>> {
        let request = self
            .client
            .get(self.url(GET_SESSION)?)
            .header(reqwest::header::AUTHORIZATION, token.authorization_header());
        let response = match send(GET_SESSION, request).await {
            Ok(response) => response,
            Err(ProviderError::Rejected { status, .. }) if status == StatusCode::UNAUTHORIZED.as_u16() => {
                return Ok(None);
            }
            Err(error) => return Err(error.into()),
        };
        Ok(decode::<Option<Session>>(GET_SESSION, response).await?)
    }

    async fn backend_token(
        &self,
        token: &BearerToken,
    ) -> ProviderResult<Option<BearerToken>> {
        let request = self
            .client
            .get(self.url(BACKEND_TOKEN)?)
            .header(reqwest::header::AUTHORIZATION, token.authorization_header());
        let response = match send(BACKEND_TOKEN, request).await {
            Ok(response) => response,
            Err(ProviderError::Rejected { status, .. }) if status == StatusCode::UNAUTHORIZED.as_u16() => {
                return Ok(None);
            }
            Err(error) => return Err(error.into()),
        };
        let body: TokenBody = decode(BACKEND_TOKEN, response).await?;
        Ok(body.into_token())
    }

    async fn verify_one_time_token(
        &self,
        one_time_token: &str,
    ) -> ProviderResult<Option<BearerToken>> {
        let request = self
            .client
            .post(self.url(VERIFY_ONE_TIME_TOKEN)?)
            .json(&serde_json::json!({ "token": one_time_token }));
        let response = match send(VERIFY_ONE_TIME_TOKEN, request).await {
            Ok(response) => response,
            // Expired, unknown or already-used tokens come back as client errors.
            Err(ProviderError::Rejected { status, .. }) if (400..500).contains(&status) => {
                return Ok(None);
            }
            Err(error) => return Err(error.into()),
        };
        let body: VerifiedOneTimeToken = decode(VERIFY_ONE_TIME_TOKEN, response).await?;
        Ok(body
            .session
            .and_then(|session| session.token)
            .as_deref()
            .and_then(BearerToken::from_raw))
    }

    async fn sign_out(&self, token: &BearerToken) -> ProviderResult<()> {
        let request = self
            .client
            .post(self.url(SIGN_OUT)?)
            .header(reqwest::header::AUTHORIZATION, token.authorization_header())
            .json(&serde_json::json!({}));
        send(SIGN_OUT, request).await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    path: &'a str,
    args: serde_json::Value,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum QueryResponse {
    Success {
        value: serde_json::Value,
    },
    Error {
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

/// Client for the backend service's query API.
#[derive(Debug, Clone)]
pub struct HttpBackendClient {
    client: Client,
    base_url: Url,
}

impl HttpBackendClient {
    /// Creates a client for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL.
    pub fn new(client: Client, base_url: &str) -> ProviderResult<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// Runs the query at `path` with `token` attached.
    async fn query<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &BearerToken,
    ) -> Result<T, ProviderError> {
        let request = self
            .client
            .post(endpoint_url(&self.base_url, QUERY)?)
            .header(reqwest::header::AUTHORIZATION, token.authorization_header())
            .json(&QueryRequest {
                path,
                args: serde_json::json!({}),
                format: "json",
            });
        let response = send(QUERY, request).await?;

        match decode::<QueryResponse>(QUERY, response).await? {
            QueryResponse::Success { value } => {
                serde_json::from_value(value).map_err(|e| ProviderError::Decode {
                    endpoint: path.to_string(),
                    reason: e.to_string(),
                })
            }
            QueryResponse::Error { error_message } => Err(ProviderError::Query {
                path: path.to_string(),
                message: error_message,
            }),
        }
    }
}

#[async_trait]
impl BackendService for HttpBackendClient {
    async fn current_session(
        &self,
        token: &BearerToken,
    ) -> ProviderResult<Option<Session>> {
        Ok(self.query(CURRENT_SESSION_QUERY, token).await?)
    }

    async fn current_user(
        &self,
        token: &BearerToken,
    ) -> ProviderResult<Option<SessionUser>> {
        Ok(self.query(CURRENT_USER_QUERY, token).await?)
    }

    async fn is_authenticated(&self, token: &BearerToken) -> ProviderResult<bool> {
        Ok(self.query(IS_AUTHENTICATED_QUERY, token).await?)
    }
}
