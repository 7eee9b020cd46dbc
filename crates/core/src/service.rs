use crate::config::Settings;
use crate::domain::weather::{AggregateMap, WeatherData, WeatherQuery};
use crate::fmi::{FetchError, FmiClient, ObservationFetcher};
use crate::parse::{self, EnvelopeError, SkippedRecord};
use crate::report;
use crate::storage::dump::preserve_payload;
use bytes::Bytes;
use chrono::{DateTime, Local, TimeZone};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Per-request failure. Each variant maps to a single flat error response.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("no observation data within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("observation fetch task ended without a result")]
    FetchAborted,

    #[error("malformed feature collection: {0}")]
    MalformedEnvelope(#[from] EnvelopeError),
}

impl RequestError {
    /// Fixed message shown to the client.
    pub fn public_message(&self) -> &'static str {
        match self {
            RequestError::Timeout(_) => "data read timeout",
            RequestError::Fetch(_) | RequestError::FetchAborted => "data fetch failed",
            RequestError::MalformedEnvelope(_) => "data parse failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeatherReport {
    pub query: WeatherQuery,
    pub dates: AggregateMap,
    pub skipped: Vec<SkippedRecord>,
}

impl WeatherReport {
    pub fn render_page<Tz>(&self, generated_at: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        report::render_page(generated_at, &self.query.year, &self.dates)
    }

    pub fn hot_days(&self) -> usize {
        report::hot_day_count(&self.dates)
    }

    pub fn to_weather_data(&self) -> WeatherData {
        WeatherData::new(&self.query, &self.dates)
    }
}

/// Decodes `payload` and folds it into a report, using `tz` for calendar dates.
pub fn build_report<Tz: TimeZone>(
    query: &WeatherQuery,
    payload: &[u8],
    tz: &Tz,
) -> Result<WeatherReport, EnvelopeError> {
    let collection = parse::decode(payload)?;
    let outcome = parse::fold_records(&collection.members, tz);

    tracing::debug!(
        fmisid = %query.fmisid,
        year = %query.year,
        records = collection.members.len(),
        dates = outcome.dates.len(),
        skipped = outcome.skipped.len(),
        "observations folded"
    );

    Ok(WeatherReport {
        query: query.clone(),
        dates: outcome.dates,
        skipped: outcome.skipped,
    })
}

/// Runs fetch, parse and aggregation for one request under a fixed deadline.
#[derive(Clone)]
pub struct WeatherService {
    fetcher: Arc<dyn ObservationFetcher>,
    deadline: Duration,
    dump_path: Option<PathBuf>,
}

impl fmt::Debug for WeatherService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherService")
            .field("source", &self.fetcher.source_name())
            .field("deadline", &self.deadline)
            .field("dump_path", &self.dump_path)
            .finish()
    }
}

impl WeatherService {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let client = FmiClient::from_settings(settings)?;
        Ok(Self::new(Arc::new(client), settings.request_deadline)
            .with_dump_path(settings.dump_path.clone()))
    }

    pub fn new(fetcher: Arc<dyn ObservationFetcher>, deadline: Duration) -> Self {
        Self {
            fetcher,
            deadline,
            dump_path: None,
        }
    }

    pub fn with_dump_path(mut self, path: PathBuf) -> Self {
        self.dump_path = Some(path);
        self
    }

    pub async fn run(&self, query: &WeatherQuery) -> Result<WeatherReport, RequestError> {
        let payload = self.fetch_with_deadline(query).await?;

        match build_report(query, &payload, &Local) {
            Ok(report) => {
                if !report.skipped.is_empty() {
                    tracing::warn!(
                        fmisid = %query.fmisid,
                        skipped = report.skipped.len(),
                        "some observation records were skipped"
                    );
                }
                Ok(report)
            }
            Err(err) => {
                tracing::error!(fmisid = %query.fmisid, error = %err, "failed to decode FMI payload");
                self.preserve(payload).await;
                Err(err.into())
            }
        }
    }

    async fn fetch_with_deadline(&self, query: &WeatherQuery) -> Result<Bytes, RequestError> {
        let cancel = CancellationToken::new();
        // Cancels the fetch on every exit from here, the deadline branch included.
        let _cancel_on_exit = cancel.clone().drop_guard();

        let (tx, rx) = oneshot::channel();
        let fetcher = Arc::clone(&self.fetcher);
        let task_query = query.clone();
        tokio::spawn(async move {
            let res = fetcher.fetch(&task_query, cancel).await;
            // The receiver is gone once the deadline has fired.
            let _ = tx.send(res);
        });

        tokio::select! {
            res = rx => match res {
                Ok(res) => res.map_err(RequestError::from),
                Err(_) => Err(RequestError::FetchAborted),
            },
            _ = tokio::time::sleep(self.deadline) => {
                tracing::error!(
                    fmisid = %query.fmisid,
                    deadline = ?self.deadline,
                    "observation fetch deadline elapsed"
                );
                Err(RequestError::Timeout(self.deadline))
            }
        }
    }

    async fn preserve(&self, payload: Bytes) {
        let Some(path) = self.dump_path.clone() else {
            return;
        };

        match tokio::task::spawn_blocking(move || preserve_payload(&path, &payload)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "failed to preserve malformed payload")
            }
            Err(err) => tracing::warn!(error = %err, "payload dump task failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::feature_collection::tests::{collection, member};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    enum Behavior {
        Respond(Bytes),
        Fail,
        Panic,
        /// Sleeps, then responds unless cancelled first.
        Slow(Duration, Bytes),
        /// Sleeps and responds, ignoring cancellation.
        Stubborn(Duration, Bytes),
    }

    struct FakeFetcher {
        behavior: Behavior,
        cancelled: Arc<AtomicBool>,
    }

    impl FakeFetcher {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                cancelled: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait::async_trait]
    impl ObservationFetcher for FakeFetcher {
        fn source_name(&self) -> &'static str {
            "fake"
        }

        async fn fetch(
            &self,
            _query: &WeatherQuery,
            cancel: CancellationToken,
        ) -> Result<Bytes, FetchError> {
            match &self.behavior {
                Behavior::Respond(body) => Ok(body.clone()),
                Behavior::Fail => Err(FetchError::Timeout),
                Behavior::Panic => panic!("fetcher blew up"),
                Behavior::Slow(delay, body) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            self.cancelled.store(true, Ordering::SeqCst);
                            Err(FetchError::Cancelled)
                        }
                        _ = tokio::time::sleep(*delay) => Ok(body.clone()),
                    }
                }
                Behavior::Stubborn(delay, body) => {
                    tokio::time::sleep(*delay).await;
                    Ok(body.clone())
                }
            }
        }
    }

    fn query() -> WeatherQuery {
        WeatherQuery::resolve(Some("100971"), Some("2019"), "100971")
    }

    fn hot_payload() -> Bytes {
        Bytes::from(collection(&[
            member("2019-06-01T12:00:00+03:00", "tmax", "27.5"),
            member("2019-06-02T12:00:00+03:00", "tmax", "not-a-number"),
        ]))
    }

    fn service(behavior: Behavior, deadline: Duration) -> (WeatherService, Arc<AtomicBool>) {
        let fetcher = FakeFetcher::new(behavior);
        let cancelled = Arc::clone(&fetcher.cancelled);
        (WeatherService::new(Arc::new(fetcher), deadline), cancelled)
    }

    #[tokio::test]
    async fn ready_result_is_parsed_and_aggregated() {
        let (svc, _) = service(Behavior::Respond(hot_payload()), Duration::from_secs(5));

        let report = svc.run(&query()).await.unwrap();
        assert_eq!(report.dates.len(), 1);
        let day = report.dates["2019-06-01"];
        assert_eq!(day.max, 27.5);
        assert!(day.min.is_nan() && day.avg.is_nan());
        assert_eq!(report.hot_days(), 1);
        assert_eq!(report.skipped.len(), 1);
    }

    #[tokio::test]
    async fn deadline_cancels_in_flight_fetch() {
        let (svc, cancelled) = service(
            Behavior::Slow(Duration::from_secs(30), hot_payload()),
            Duration::from_millis(50),
        );

        let started = Instant::now();
        let err = svc.run(&query()).await.unwrap_err();
        assert!(matches!(err, RequestError::Timeout(_)));
        assert_eq!(err.public_message(), "data read timeout");
        assert!(started.elapsed() < Duration::from_secs(5));

        for _ in 0..50 {
            if cancelled.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("fetch was not cancelled after the deadline");
    }

    #[tokio::test]
    async fn timeout_wins_even_if_fetch_later_succeeds() {
        let (svc, _) = service(
            Behavior::Stubborn(Duration::from_millis(200), hot_payload()),
            Duration::from_millis(20),
        );

        let err = svc.run(&query()).await.unwrap_err();
        assert!(matches!(err, RequestError::Timeout(_)));

        // Let the abandoned task finish; it must not affect anything.
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    #[tokio::test]
    async fn fetch_failure_is_reported_before_deadline() {
        let (svc, _) = service(Behavior::Fail, Duration::from_secs(5));

        let started = Instant::now();
        let err = svc.run(&query()).await.unwrap_err();
        assert!(matches!(err, RequestError::Fetch(FetchError::Timeout)));
        assert_eq!(err.public_message(), "data fetch failed");
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn panicking_fetch_is_a_request_failure() {
        let (svc, _) = service(Behavior::Panic, Duration::from_secs(5));

        let err = svc.run(&query()).await.unwrap_err();
        assert!(matches!(err, RequestError::FetchAborted));
    }

    #[tokio::test]
    async fn malformed_envelope_is_dumped_and_confined_to_request() {
        let dir = tempfile::tempdir().unwrap();
        let dump = dir.path().join("failed.xml");
        let payload = Bytes::from_static(b"<wfs:FeatureCollection");
        let (svc, _) = service(Behavior::Respond(payload.clone()), Duration::from_secs(5));
        let svc = svc.with_dump_path(dump.clone());

        let err = svc.run(&query()).await.unwrap_err();
        assert!(matches!(err, RequestError::MalformedEnvelope(_)));
        assert_eq!(err.public_message(), "data parse failed");
        assert_eq!(std::fs::read(&dump).unwrap(), payload.to_vec());
    }

    #[tokio::test]
    async fn dump_failure_does_not_change_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let dump = dir.path().join("missing-dir").join("failed.xml");
        let (svc, _) = service(
            Behavior::Respond(Bytes::from_static(b"not xml at all")),
            Duration::from_secs(5),
        );
        let svc = svc.with_dump_path(dump.clone());

        let err = svc.run(&query()).await.unwrap_err();
        assert!(matches!(err, RequestError::MalformedEnvelope(_)));
        assert!(!dump.exists());
    }

    #[test]
    fn build_report_uses_given_zone() {
        let payload = collection(&[member("2019-06-01T22:00:00Z", "tmin", "14.0")]);
        let helsinki = chrono::FixedOffset::east_opt(3 * 3600).unwrap();

        let report = build_report(&query(), payload.as_bytes(), &helsinki).unwrap();
        assert_eq!(report.dates["2019-06-02"].min, 14.0);
        assert_eq!(report.to_weather_data().dates.len(), 1);
    }
}
