//! reqwest plumbing shared by the management API and Docker proxy clients.

use reqwest::{Client, Response};
use std::time::Duration;
use tracing::warn;
use url::Url;

use crate::errors::ApiError;

/// How a client bounds the time spent on a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Limit on the whole call, from connect to the end of the body
    Total(Duration),
    /// Limit on connecting and on each read. A response that keeps streaming is never cut off,
    /// which image pulls rely on.
    Read(Duration),
}

/// Build a client with the given timeout mode.
///
/// `accept_invalid_certs` turns off certificate and hostname verification entirely. It is only
/// ever set from explicit configuration.
pub fn build_client(timeout: Timeout, accept_invalid_certs: bool) -> Result<Client, ApiError> {
    if accept_invalid_certs {
        warn!("TLS certificate verification is disabled for Portainer requests");
    }
    let builder = match timeout {
        Timeout::Total(total) => Client::builder().timeout(total),
        Timeout::Read(read) => Client::builder().connect_timeout(read).read_timeout(read),
    };
    Ok(builder.danger_accept_invalid_certs(accept_invalid_certs).build()?)
}

/// Makes sure a url has a trailing slash.
///
/// `Url::join` replaces the last path segment unless the base ends in '/', so joining
/// 'https://host/api' with 'auth' would give 'https://host/auth'. Call this before joining.
pub fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let mut path = new_url.path().to_string();
        path.push('/');
        new_url.set_path(&path);
        new_url
    }
}

/// Body of a rejected response, or a note saying why it could not be read
async fn error_body(response: Response) -> String {
    match response.text().await {
        Ok(body) => body,
        Err(e) => format!("<unreadable body: {e}>"),
    }
}

/// Pass the response through if its status is one of `accepted`, otherwise turn it into
/// [`ApiError::Status`] carrying the response body.
pub async fn expect_status(response: Response, accepted: &[u16]) -> Result<Response, ApiError> {
    let status = response.status().as_u16();
    if accepted.contains(&status) {
        return Ok(response);
    }
    let body = error_body(response).await;
    Err(ApiError::Status { status, body })
}

/// Like [`expect_status`] but accepting any 2xx status
pub async fn expect_success(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = error_body(response).await;
    Err(ApiError::Status { status, body })
}
