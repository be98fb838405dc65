use crate::error::Result;
use async_trait::async_trait;

pub mod local;
pub mod s3;

pub use local::PublicUrlSigner;
pub use s3::S3Signer;

/// Issues client-facing URLs for media stored under an opaque key.
#[async_trait]
pub trait MediaSigner: Send + Sync + std::fmt::Debug {
    async fn sign(&self, key: &str) -> Result<String>;
}
