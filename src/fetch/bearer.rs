use super::client::HttpClient;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;

/// An [`HttpClient`] wrapper that injects an `Authorization: Bearer` header,
/// for artifact stores that gate simulation exports behind a token.
pub struct BearerToken<C> {
    inner: C,
    value: String,
}

impl<C> BearerToken<C> {
    pub fn new(inner: C, token: &str) -> Self {
        Self {
            inner,
            value: format!("Bearer {token}"),
        }
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for BearerToken<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        if let Ok(header) = self.value.parse() {
            req.headers_mut().insert(AUTHORIZATION, header);
        }
        self.inner.execute(req).await
    }
}
