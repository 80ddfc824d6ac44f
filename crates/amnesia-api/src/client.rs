//! Twitter v1.1 REST client.

use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use amnesia_core::{AmnesiaError, ApiConfig, Item, ItemId, ItemKind, Result, UserKeys};

use crate::api::{Account, PageRequest, SocialApi};
use crate::oauth::OAuthSigner;
use crate::ratelimit::RateLimitInfo;
use crate::types::{ErrorBody, RawStatus, RawUser};

/// Twitter REST API client signing every call with the user's keys.
#[derive(Debug, Clone)]
pub struct TwitterClient {
    client: Client,
    base_url: String,
    signer: OAuthSigner,
}

impl TwitterClient {
    /// Create a new client.
    pub fn new(config: &ApiConfig, keys: &UserKeys) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(transport_error)?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            signer: OAuthSigner::new(keys),
        })
    }

    /// Make a signed GET request.
    #[instrument(skip(self, params))]
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<T> {
        self.request(Method::GET, endpoint, params).await
    }

    /// Make a signed POST request.
    #[instrument(skip(self, params))]
    pub async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<T> {
        self.request(Method::POST, endpoint, params).await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        let auth_header = self.signer.sign(method.as_str(), &url, params)?;

        debug!(%method, endpoint, "Making Twitter API request");

        let response = self
            .client
            .request(method, &url)
            .query(params)
            .header(reqwest::header::AUTHORIZATION, auth_header)
            .send()
            .await
            .map_err(transport_error)?;

        handle_response(response).await
    }
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let rate_limit = RateLimitInfo::from_headers(response.headers());

    if rate_limit.is_exhausted() {
        debug!(reset = ?rate_limit.reset, "Rate limit exhausted");
    }

    let bytes = response.bytes().await.map_err(transport_error)?;

    if status.is_success() {
        return serde_json::from_slice(&bytes).map_err(|e| AmnesiaError::Decode {
            message: e.to_string(),
        });
    }

    Err(ErrorBody::parse(&bytes).into_error(status.as_u16(), rate_limit.time_until_reset()))
}

fn transport_error(error: reqwest::Error) -> AmnesiaError {
    AmnesiaError::http(error.to_string())
}

fn page_params(kind: ItemKind, request: &PageRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("user_id".to_string(), request.user_id.clone()),
        ("count".to_string(), request.count.to_string()),
        ("tweet_mode".to_string(), "extended".to_string()),
    ];

    match kind {
        ItemKind::Tweet => {
            params.push(("trim_user".to_string(), "true".to_string()));
            params.push(("include_rts".to_string(), request.include_retweets.to_string()));
        }
        ItemKind::Favorite => {
            params.push(("include_entities".to_string(), "false".to_string()));
        }
    }

    if let Some(max_id) = request.max_id {
        params.push(("max_id".to_string(), max_id.to_string()));
    }

    params
}

#[async_trait]
impl SocialApi for TwitterClient {
    async fn verify_credentials(&self) -> Result<Account> {
        let params = vec![
            ("skip_status".to_string(), "true".to_string()),
            ("include_entities".to_string(), "false".to_string()),
        ];
        let user: RawUser = self.get("account/verify_credentials.json", &params).await?;
        Ok(user.into())
    }

    async fn fetch_page(&self, kind: ItemKind, request: &PageRequest) -> Result<Vec<Item>> {
        let endpoint = match kind {
            ItemKind::Tweet => "statuses/user_timeline.json",
            ItemKind::Favorite => "favorites/list.json",
        };

        let statuses: Vec<RawStatus> = self.get(endpoint, &page_params(kind, request)).await?;
        statuses
            .into_iter()
            .map(|status| status.into_item(kind))
            .collect()
    }

    async fn delete_item(&self, kind: ItemKind, id: ItemId) -> Result<()> {
        // Both endpoints echo the status back; only success matters.
        let _: serde_json::Value = match kind {
            ItemKind::Tweet => {
                self.post(
                    &format!("statuses/destroy/{id}.json"),
                    &[("trim_user".to_string(), "true".to_string())],
                )
                .await?
            }
            ItemKind::Favorite => {
                self.post(
                    "favorites/destroy.json",
                    &[
                        ("id".to_string(), id.to_string()),
                        ("include_entities".to_string(), "false".to_string()),
                    ],
                )
                .await?
            }
        };
        Ok(())
    }
}
