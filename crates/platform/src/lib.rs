pub mod client;
pub mod collector;

pub use client::PlatformClient;
pub use collector::{Collector, Continuation, SupervisionStrategy};

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] database::DatabaseError),
    #[error(transparent)]
    EventBus(#[from] eventbus::EventBusError),
    #[error(transparent)]
    Upstream(#[from] upstream::UpstreamError),
}

pub type PlatformResult<T> = Result<T, PlatformError>;
