//! Credential forwarding.
//!
//! The inbound `Authorization` header is read once per request, normalized
//! into a [`Credential`], and attached to every outbound downstream call.
//! Missing credentials are not an error here; downstream services reject the
//! call and the client reports it as a transport failure.

use std::convert::Infallible;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use pulse_core::{Credential, DownstreamRequest};
use reqwest::header::AUTHORIZATION;

/// Attach the inbound credential to an outbound request.
pub fn forward(request: DownstreamRequest, inbound: Option<&Credential>) -> DownstreamRequest {
    request.with_credential(inbound.cloned())
}

/// Set the `Authorization` header of an outbound HTTP call from the request's
/// forwarded credential, if any.
pub(crate) fn apply(
    builder: reqwest::RequestBuilder,
    request: &DownstreamRequest,
) -> reqwest::RequestBuilder {
    match request.credential() {
        Some(credential) => builder.header(AUTHORIZATION, credential.header_value()),
        None => builder,
    }
}

/// Extractor for the caller's normalized bearer credential.
///
/// Never rejects; an absent or blank header yields `None`.
#[derive(Debug, Clone)]
pub struct ForwardedCredential(pub Option<Credential>);

#[async_trait]
impl<S> FromRequestParts<S> for ForwardedCredential
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let credential = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(Credential::from_header);
        Ok(Self(credential))
    }
}
