//! `reqwest` implementation of [`ShopApi`].

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::instrument;
use url::Url;

use cartwheel_core::{CartLine, Product, ProductId, User};

use super::conversions::{
    convert_auth, convert_cart, convert_current_user, convert_wishlist,
};
use super::wire::{WireAuthResponse, WireCart, WireErrorBody, WireWishlist};
use super::{ApiError, AuthGrant, LoginRequest, Registration, ShopApi};
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;

/// How much of an unexpected body to keep in logs.
const LOG_BODY_LIMIT: usize = 500;

/// Client for the storefront REST API.
///
/// Cheap to clone; all clones share one connection pool and credential
/// slot.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    credentials: Arc<dyn CredentialStore>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(
        config: &ClientConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
                credentials,
            }),
        })
    }

    /// Resolve `segments` below the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Start a request, attaching the persisted bearer token if present.
    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(segments)?;
        let mut builder = self.inner.client.request(method, url);
        if let Some(token) = self.inner.credentials.load()? {
            builder = builder.bearer_auth(token.expose());
        }
        Ok(builder)
    }

    /// Send a request and turn non-success statuses into [`ApiError::Status`].
    async fn send(builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<WireErrorBody>(&body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .filter(|m| !m.trim().is_empty());

        tracing::debug!(
            status = %status,
            body = %body.chars().take(LOG_BODY_LIMIT).collect::<String>(),
            "API returned non-success status"
        );

        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// Send a request and decode its JSON body.
    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
        let text = Self::send(builder).await?.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(LOG_BODY_LIMIT).collect::<String>(),
                "Failed to parse API response"
            );
            ApiError::Decode(e)
        })
    }

    /// Send a request whose response body is irrelevant.
    async fn send_empty(builder: RequestBuilder) -> Result<(), ApiError> {
        Self::send(builder).await.map(drop)
    }
}

impl ShopApi for ApiClient {
    #[instrument(skip(self))]
    async fn current_user(&self) -> Result<User, ApiError> {
        let value: Value = Self::send_json(self.request(Method::GET, &["auth", "me"])?).await?;
        convert_current_user(value)
    }

    #[instrument(skip(self, registration), fields(email = %registration.email))]
    async fn register(&self, registration: &Registration) -> Result<AuthGrant, ApiError> {
        let builder = self
            .request(Method::POST, &["auth", "register"])?
            .json(registration);
        convert_auth(Self::send_json::<WireAuthResponse>(builder).await?)
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn login(&self, request: &LoginRequest) -> Result<AuthGrant, ApiError> {
        let builder = self.request(Method::POST, &["auth", "login"])?.json(request);
        convert_auth(Self::send_json::<WireAuthResponse>(builder).await?)
    }

    #[instrument(skip(self))]
    async fn fetch_cart(&self) -> Result<Vec<CartLine>, ApiError> {
        let wire: WireCart = Self::send_json(self.request(Method::GET, &["cart"])?).await?;
        Ok(convert_cart(wire))
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn add_to_cart(&self, product_id: &ProductId, quantity: u32) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, &["cart"])?
            .json(&json!({ "productId": product_id, "qty": quantity }));
        Self::send_empty(builder).await
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn update_cart_line(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let builder = self
            .request(Method::PUT, &["cart", product_id.as_str()])?
            .json(&json!({ "qty": quantity }));
        Self::send_empty(builder).await
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn remove_cart_line(&self, product_id: &ProductId) -> Result<(), ApiError> {
        Self::send_empty(self.request(Method::DELETE, &["cart", product_id.as_str()])?).await
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<(), ApiError> {
        Self::send_empty(self.request(Method::DELETE, &["cart"])?).await
    }

    #[instrument(skip(self))]
    async fn fetch_wishlist(&self) -> Result<Vec<Product>, ApiError> {
        let wire: WireWishlist = Self::send_json(self.request(Method::GET, &["wishlist"])?).await?;
        Ok(convert_wishlist(wire))
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn add_to_wishlist(&self, product_id: &ProductId) -> Result<(), ApiError> {
        let builder = self
            .request(Method::POST, &["wishlist"])?
            .json(&json!({ "productId": product_id }));
        Self::send_empty(builder).await
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn remove_from_wishlist(&self, product_id: &ProductId) -> Result<(), ApiError> {
        Self::send_empty(self.request(Method::DELETE, &["wishlist", product_id.as_str()])?).await
    }
}
