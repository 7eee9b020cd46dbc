use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use helle_core::config::Settings;
use helle_core::domain::weather::WeatherQuery;
use helle_core::service::{build_report, WeatherReport, WeatherService};

#[derive(Debug, Parser)]
#[command(name = "helle_cli")]
struct Args {
    /// FMI station id. Defaults to HELLE_DEFAULT_FMISID (Kaisaniemi).
    #[arg(long)]
    sid: Option<String>,

    /// Year to report (YYYY). Anything that is not four characters falls back to 2019.
    #[arg(long)]
    year: Option<String>,

    /// Render a saved feature-collection payload (e.g. failed.xml) instead of fetching.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Print the daily aggregates as JSON instead of the text report.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let query = WeatherQuery::resolve(
        args.sid.as_deref(),
        args.year.as_deref(),
        &settings.default_fmisid,
    );

    let report = match load_report(&settings, &query, args.file.as_ref()).await {
        Ok(report) => report,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(fmisid = %query.fmisid, year = %query.year, error = %err, "weather report failed");
            return Err(err);
        }
    };

    if args.json {
        let json = serde_json::to_string_pretty(&report.to_weather_data())
            .context("failed to serialize weather data")?;
        println!("{json}");
    } else {
        print!("{}", report.render_page(&chrono::Local::now()));
    }

    Ok(())
}

async fn load_report(
    settings: &Settings,
    query: &WeatherQuery,
    file: Option<&PathBuf>,
) -> anyhow::Result<WeatherReport> {
    if let Some(path) = file {
        let payload = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let report = build_report(query, &payload, &chrono::Local)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        return Ok(report);
    }

    let service = WeatherService::from_settings(settings)?;
    let report = service.run(query).await?;
    Ok(report)
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
