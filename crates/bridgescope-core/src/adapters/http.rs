use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProviderConfig;
use crate::data_source::{
    BridgeDataSource, ProviderError, SourceFuture, UpstreamQuote, PING_TIMEOUT,
};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
use crate::retry::{classify_response, classify_transport_error, RetryConfig, RetryExecutor};
use crate::throttling::RateLimiter;
use crate::{Amount, Asset, Route, ValidationError, Window};

/// [`BridgeDataSource`] over a JSON HTTP API.
///
/// | Capability | Request |
/// |------------|---------|
/// | volume | `GET {base}/volume?window=24h` |
/// | quote | `POST {base}/quote` |
/// | listed assets | `GET {base}/assets` |
/// | ping | `GET {base}/health` |
///
/// Every call except `ping` goes through one [`RetryExecutor`] and therefore
/// through the shared [`RateLimiter`].
#[derive(Clone)]
pub struct HttpBridgeSource {
    config: ProviderConfig,
    auth: HttpAuth,
    http_client: Arc<dyn HttpClient>,
    executor: RetryExecutor,
}

impl HttpBridgeSource {
    pub fn new(
        config: ProviderConfig,
        http_client: Arc<dyn HttpClient>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, ProviderError> {
        config
            .validate()
            .map_err(|error| ProviderError::configuration(error.to_string()))?;

        let auth = match &config.credential {
            Some(token) => HttpAuth::BearerToken(token.clone()),
            None => HttpAuth::None,
        };
        let executor = RetryExecutor::new(Arc::clone(&http_client), limiter, config.retry_config());

        Ok(Self {
            config,
            auth,
            http_client,
            executor,
        })
    }

    /// Production wiring: reqwest transport and a limiter sized from the config.
    pub fn from_config(config: ProviderConfig) -> Result<Self, ProviderError> {
        let limiter = Arc::new(RateLimiter::new(config.requests_per_second));
        Self::new(config, Arc::new(ReqwestHttpClient::default()), limiter)
    }

    /// Replaces the retry settings derived from [`ProviderConfig`].
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.executor = RetryExecutor::new(Arc::clone(&self.http_client), self.executor.limiter(), retry);
        self
    }

    fn get(&self, path: &str) -> HttpRequest {
        HttpRequest::get(self.config.endpoint(path)).with_auth(&self.auth)
    }
}

impl BridgeDataSource for HttpBridgeSource {
    fn volume<'a>(&'a self, window: Window) -> SourceFuture<'a, Decimal> {
        Box::pin(async move {
            let path = format!("volume?window={}", urlencoding::encode(window.as_str()));
            self.executor
                .execute(self.get(&path), parse_volume)
                .await
        })
    }

    fn quote<'a>(
        &'a self,
        route: &'a Route,
        amount_in: &'a Amount,
    ) -> SourceFuture<'a, UpstreamQuote> {
        Box::pin(async move {
            let body = serde_json::to_string(&QuoteRequestBody {
                source: &route.source,
                destination: &route.destination,
                amount_in,
            })
            .map_err(|error| ProviderError::InvalidRequest {
                message: format!("failed to encode quote request: {error}"),
            })?;

            let request =
                HttpRequest::post_json(self.config.endpoint("quote"), body).with_auth(&self.auth);
            debug!(route = %route, amount_in = %amount_in, "requesting upstream quote");
            self.executor
                .execute(request, parse_quote)
                .await
        })
    }

    fn listed_assets<'a>(&'a self) -> SourceFuture<'a, Vec<Asset>> {
        Box::pin(async move {
            self.executor
                .execute(self.get("assets"), parse_assets)
                .await
        })
    }

    fn ping<'a>(&'a self) -> SourceFuture<'a, ()> {
        Box::pin(async move {
            let request = self
                .get("health")
                .with_timeout_ms(PING_TIMEOUT.as_millis() as u64);

            match tokio::time::timeout(PING_TIMEOUT, self.http_client.execute(request)).await {
                Err(_) => Err(ProviderError::transient("health probe timed out")),
                Ok(Err(error)) => Err(classify_transport_error(error)),
                Ok(Ok(response)) => classify_response(&response),
            }
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRequestBody<'a> {
    source: &'a Asset,
    destination: &'a Asset,
    amount_in: &'a Amount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumePayload {
    #[serde(with = "rust_decimal::serde::float")]
    volume_usd: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuotePayload {
    amount_out: String,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    total_fees_usd: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct AssetsPayload {
    assets: Vec<AssetPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetPayload {
    chain_id: String,
    asset_id: String,
    symbol: String,
    decimals: i64,
}

fn decode<'de, T: Deserialize<'de>>(response: &'de HttpResponse, what: &str) -> Result<T, ProviderError> {
    serde_json::from_str(&response.body)
        .map_err(|error| ProviderError::malformed_payload(format!("{what}: {error}")))
}

fn parse_volume(response: &HttpResponse) -> Result<Decimal, ProviderError> {
    let payload: VolumePayload = decode(response, "volume response")?;
    if payload.volume_usd.is_sign_negative() {
        return Err(ValidationError::NegativeValue { field: "volumeUsd" }.into());
    }
    Ok(payload.volume_usd)
}

fn parse_quote(response: &HttpResponse) -> Result<UpstreamQuote, ProviderError> {
    let payload: QuotePayload = decode(response, "quote response")?;
    let amount_out = Amount::parse(&payload.amount_out)?;
    Ok(UpstreamQuote {
        amount_out,
        total_fees_usd: payload.total_fees_usd,
    })
}

fn parse_assets(response: &HttpResponse) -> Result<Vec<Asset>, ProviderError> {
    let payload: AssetsPayload = decode(response, "assets response")?;
    payload
        .assets
        .into_iter()
        .map(|asset| {
            Asset::from_upstream(asset.chain_id, asset.asset_id, asset.symbol, asset.decimals)
                .map_err(ProviderError::from)
        })
        .collect()
}
