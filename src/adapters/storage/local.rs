use crate::adapters::Probe;
use crate::adapters::storage::MediaSigner;
use crate::error::Result;
use async_trait::async_trait;

/// Resolves keys against a public base URL without signing; for local setups and tests.
#[derive(Clone, Debug)]
pub struct PublicUrlSigner {
    base_url: String,
}

impl PublicUrlSigner {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }
}

#[async_trait]
impl MediaSigner for PublicUrlSigner {
    async fn sign(&self, key: &str) -> Result<String> {
        Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), key.trim_start_matches('/')))
    }
}

#[async_trait]
impl Probe for PublicUrlSigner {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
