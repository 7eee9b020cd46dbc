//! Remote observation source: the FMI open-data WFS feature service.

pub mod client;
pub mod error;

pub use client::FmiClient;
pub use error::FetchError;

use crate::domain::weather::WeatherQuery;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

#[async_trait::async_trait]
pub trait ObservationFetcher: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Fetches the raw feature-collection payload for one station-year. A single attempt; when
    /// `cancel` fires the call is dropped and [`FetchError::Cancelled`] is returned.
    async fn fetch(&self, query: &WeatherQuery, cancel: CancellationToken)
        -> Result<Bytes, FetchError>;
}
