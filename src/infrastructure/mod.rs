pub mod artifact_store;
pub mod cryptocompare;
pub mod http_client_factory;
pub mod mock;
pub mod news;

pub use artifact_store::{ArtifactBatch, ArtifactStatus, ArtifactStore};
pub use http_client_factory::HttpClientFactory;
