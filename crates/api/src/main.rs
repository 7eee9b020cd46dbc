use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use helle_core::config::Settings;
use helle_core::domain::weather::WeatherQuery;
use helle_core::service::WeatherService;

// Upper bound for reading the request and writing the response.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

const USAGE: &str = "query server with: /weather/<fmi station id>\n\
                     add optional ?year=NNNN for specific year";

#[derive(Debug, Parser)]
#[command(name = "helle_api")]
struct Args {
    /// FMI station id used when the request path has none, see
    /// https://ilmatieteenlaitos.fi/havaintoasemat. Overrides HELLE_DEFAULT_FMISID.
    #[arg(long)]
    sid: Option<String>,

    /// Address to listen on. Overrides HELLE_LISTEN_ADDR.
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let mut settings = Settings::from_env()?.with_default_fmisid(args.sid);
    if let Some(listen) = args.listen {
        settings.listen_addr = listen;
    }
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    tracing::info!(fmisid = %settings.default_fmisid, "default FMI station");

    let state = AppState {
        service: WeatherService::from_settings(&settings)?,
        default_fmisid: Arc::from(settings.default_fmisid.as_str()),
    };
    let app = router(state);

    let addr = settings.listen_addr;
    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[derive(Debug, Clone)]
struct AppState {
    service: WeatherService,
    default_fmisid: Arc<str>,
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(usage))
        .route("/weather", get(get_default_station))
        .route("/weather/", get(get_default_station))
        .route("/weather/:id", get(get_station))
        .with_state(state)
        .layer(TimeoutLayer::new(HTTP_TIMEOUT))
        .layer(TraceLayer::new_for_http())
}

async fn usage() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], USAGE)
}

/// Raw query pairs; a repeated `year` uses its first value.
type QueryPairs = Vec<(String, String)>;

fn first_year(params: &QueryPairs) -> Option<&str> {
    params
        .iter()
        .find(|(k, _)| k == "year")
        .map(|(_, v)| v.as_str())
}

async fn get_default_station(
    State(state): State<AppState>,
    Query(params): Query<QueryPairs>,
) -> Response {
    weather_report(&state, None, first_year(&params)).await
}

async fn get_station(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<QueryPairs>,
) -> Response {
    if !id.bytes().all(|b| b.is_ascii_digit()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    weather_report(&state, Some(&id), first_year(&params)).await
}

async fn weather_report(state: &AppState, fmisid: Option<&str>, year: Option<&str>) -> Response {
    let query = WeatherQuery::resolve(fmisid, year, &state.default_fmisid);
    tracing::info!(fmisid = %query.fmisid, year = %query.year, "weather report requested");

    match state.service.run(&query).await {
        Ok(report) => {
            let body = report.render_page(&chrono::Local::now());
            (
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                body,
            )
                .into_response()
        }
        Err(err) => {
            sentry::capture_error(&err);
            tracing::error!(fmisid = %query.fmisid, year = %query.year, error = %err, "weather report failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("{}\n", err.public_message()),
            )
                .into_response()
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
