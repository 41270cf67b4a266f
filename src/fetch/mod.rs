//! HTTP retrieval of simulation exports.
//!
//! Event and network exports often sit in an artifact store behind HTTP;
//! the [`HttpClient`] trait lets the bearer-token decorator wrap the plain
//! client without the callers caring.

mod basic;
mod bearer;
mod client;

pub use basic::BasicClient;
pub use bearer::BearerToken;
pub use client::HttpClient;

use anyhow::Result;

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    Ok(resp.error_for_status()?.bytes().await?.to_vec())
}
