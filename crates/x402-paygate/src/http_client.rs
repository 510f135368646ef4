//! Payment-aware fetch wrapper.
//!
//! On a 402 carrying a payment challenge, picks the first affordable entry,
//! asks the [`Signer`] for an authorization, and retries the request exactly
//! once with the `X-PAYMENT` header.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::codec;
use crate::events::{FetchState, NoopObserver, PaymentEvent, PaymentObserver};
use crate::route::parse_price;
use crate::scheme::{Signer, SigningRequest, Transport};
use crate::{
    PaymentChallenge, SettlementReceipt, X402Error, PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER,
};

/// An outgoing request, buffered so it can be sent twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl FetchRequest {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_uppercase(),
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: Some(body.into()),
            ..Self::new("POST", url)
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, X402Error> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Most the client will pay for one request, in token minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpendingCeiling(pub u64);

impl SpendingCeiling {
    pub fn minor_units(self) -> u64 {
        self.0
    }

    /// Parse a price like `"$1"` or `"0.25"` into a ceiling.
    pub fn parse(price: &str, decimals: u32) -> Result<Self, X402Error> {
        parse_price(price, decimals).map(Self)
    }

    pub fn allows(self, price: u64) -> bool {
        price <= self.0
    }
}

/// Client-side fetch state machine.
pub struct PaymentFetcher<T, S> {
    transport: T,
    signer: S,
    ceiling: SpendingCeiling,
    observer: Arc<dyn PaymentObserver>,
}

impl<T: Transport, S: Signer> PaymentFetcher<T, S> {
    pub fn new(transport: T, signer: S, ceiling: SpendingCeiling) -> Self {
        Self {
            transport,
            signer,
            ceiling,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PaymentObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn ceiling(&self) -> SpendingCeiling {
        self.ceiling
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    /// Send `request`, paying once if the server asks for it.
    ///
    /// Returns the final response and the decoded settlement receipt, if the
    /// server attached one. Non-402 responses, and 402s that are not payment
    /// challenges, come back unchanged.
    pub async fn fetch(
        &self,
        request: &FetchRequest,
    ) -> Result<(FetchResponse, Option<SettlementReceipt>), X402Error> {
        let url = request.url.as_str();
        self.emit(url, None, FetchState::Initial, None);

        let response = self.transport.send(request).await?;
        if response.status != 402 {
            self.emit(url, Some(FetchState::Initial), FetchState::Done, None);
            return Ok((response, None));
        }

        let challenge = match serde_json::from_slice::<PaymentChallenge>(&response.body) {
            Ok(challenge) if !challenge.accepts.is_empty() => challenge,
            _ => {
                tracing::debug!(url, "402 without a usable payment challenge, passing through");
                self.emit(
                    url,
                    Some(FetchState::Initial),
                    FetchState::Done,
                    Some("not a payment challenge".to_string()),
                );
                return Ok((response, None));
            }
        };
        self.emit(url, Some(FetchState::Initial), FetchState::ChallengeReceived, None);

        let Some(selected) = challenge
            .accepts
            .iter()
            .find(|entry| self.ceiling.allows(entry.price_minor_units))
        else {
            let cheapest = challenge
                .accepts
                .iter()
                .map(|entry| entry.price_minor_units)
                .min()
                .unwrap_or(u64::MAX);
            tracing::warn!(
                url,
                cheapest,
                ceiling = self.ceiling.0,
                "payment exceeds spending ceiling"
            );
            self.emit(
                url,
                Some(FetchState::ChallengeReceived),
                FetchState::Done,
                Some("spending_ceiling_exceeded".to_string()),
            );
            return Err(X402Error::SpendingCeilingExceeded {
                cheapest,
                ceiling: self.ceiling.0,
            });
        };

        self.emit(
            url,
            Some(FetchState::ChallengeReceived),
            FetchState::Authorizing,
            Some(format!("{} {}", selected.scheme, selected.network)),
        );
        let signing_request =
            SigningRequest::from_requirements(challenge.x402_version, selected, self.ceiling.0);
        let authorization = match self.signer.authorize(&signing_request).await {
            Ok(authorization) => authorization,
            Err(e) => {
                self.emit(
                    url,
                    Some(FetchState::Authorizing),
                    FetchState::Done,
                    Some("authorization_declined".to_string()),
                );
                return Err(X402Error::AuthorizationDeclined(e.to_string()));
            }
        };

        let header = codec::encode(&authorization)?;
        let mut paid = request.clone();
        paid.headers
            .retain(|(k, _)| !k.eq_ignore_ascii_case(PAYMENT_HEADER));
        paid.headers.push((PAYMENT_HEADER.to_string(), header));

        self.emit(url, Some(FetchState::Authorizing), FetchState::Retrying, None);
        tracing::info!(
            url,
            price = selected.price_minor_units,
            pay_to = %selected.pay_to,
            "retrying with payment"
        );

        let response = self.transport.send(&paid).await?;
        let receipt = response
            .header(PAYMENT_RESPONSE_HEADER)
            .and_then(codec::decode_receipt);

        self.emit(
            url,
            Some(FetchState::Retrying),
            FetchState::Done,
            Some(response.status.to_string()),
        );
        Ok((response, receipt))
    }

    fn emit(&self, url: &str, from: Option<FetchState>, to: FetchState, detail: Option<String>) {
        self.observer.observe(&PaymentEvent::Fetch {
            url: url.to_string(),
            from,
            to,
            detail,
        });
    }
}

/// [`Transport`] over `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, X402Error> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| X402Error::HttpError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, X402Error> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| X402Error::HttpError(format!("invalid method {}: {e}", request.method)))?;

        let mut builder = self.http.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| X402Error::HttpError(format!("request failed: {e}")))?;

        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = resp
            .bytes()
            .await
            .map_err(|e| X402Error::HttpError(format!("failed to read body: {e}")))?
            .to_vec();

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}
