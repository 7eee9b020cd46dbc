use crate::config::Settings;
use crate::domain::weather::WeatherQuery;
use crate::fmi::{FetchError, ObservationFetcher};
use crate::time::year_bounds;
use anyhow::Context;
use bytes::Bytes;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const STORED_QUERY_ID: &str = "fmi::observations::weather::daily::simple";

#[derive(Debug, Clone)]
pub struct FmiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl FmiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Self::new(&settings.fmi_base_url, settings.fmi_timeout)
    }

    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build FMI http client")?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            timeout,
        })
    }

    pub fn query_params(query: &WeatherQuery) -> Vec<(&'static str, String)> {
        let (start, end) = year_bounds(&query.year);
        vec![
            ("service", "WFS".to_string()),
            ("version", "2.0.0".to_string()),
            ("request", "GetFeature".to_string()),
            ("storedquery_id", STORED_QUERY_ID.to_string()),
            ("starttime", start),
            ("endtime", end),
            ("fmisid", query.fmisid.clone()),
        ]
    }

    async fn fetch_once(&self, query: &WeatherQuery) -> Result<Bytes, FetchError> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&Self::query_params(query))
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        res.bytes().await.map_err(FetchError::from_reqwest)
    }
}

#[async_trait::async_trait]
impl ObservationFetcher for FmiClient {
    fn source_name(&self) -> &'static str {
        "fmi_wfs"
    }

    async fn fetch(
        &self,
        query: &WeatherQuery,
        cancel: CancellationToken,
    ) -> Result<Bytes, FetchError> {
        tracing::info!(
            fmisid = %query.fmisid,
            year = %query.year,
            timeout = ?self.timeout,
            "fetching FMI daily observations"
        );

        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            res = self.fetch_once(query) => res,
        };

        match &res {
            Ok(body) => tracing::debug!(fmisid = %query.fmisid, bytes = body.len(), "FMI payload fetched"),
            Err(err) => tracing::error!(fmisid = %query.fmisid, error = %err, "FMI fetch failed"),
        }
        res
    }
}
