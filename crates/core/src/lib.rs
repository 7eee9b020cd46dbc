pub mod domain;
pub mod fmi;
pub mod parse;
pub mod report;
pub mod service;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use std::time::Duration;

    pub const DEFAULT_FMISID: &str = "100971";
    pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
    pub const DEFAULT_FMI_BASE_URL: &str = "https://opendata.fmi.fi/wfs/fin";
    pub const DEFAULT_FMI_TIMEOUT_SECS: u64 = 3;
    pub const DEFAULT_REQUEST_DEADLINE_SECS: u64 = 5;
    pub const DEFAULT_DUMP_PATH: &str = "failed.xml";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub default_fmisid: String,
        pub listen_addr: SocketAddr,
        pub fmi_base_url: String,
        pub fmi_timeout: Duration,
        pub request_deadline: Duration,
        pub dump_path: PathBuf,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let listen_addr = env_or("HELLE_LISTEN_ADDR", DEFAULT_LISTEN_ADDR);
            let listen_addr = listen_addr
                .parse::<SocketAddr>()
                .with_context(|| format!("HELLE_LISTEN_ADDR is not a socket address: {listen_addr}"))?;

            Ok(Self {
                default_fmisid: env_or("HELLE_DEFAULT_FMISID", DEFAULT_FMISID),
                listen_addr,
                fmi_base_url: env_or("FMI_BASE_URL", DEFAULT_FMI_BASE_URL),
                fmi_timeout: Duration::from_secs(secs_or(
                    "FMI_TIMEOUT_SECS",
                    DEFAULT_FMI_TIMEOUT_SECS,
                )),
                request_deadline: Duration::from_secs(secs_or(
                    "HELLE_REQUEST_DEADLINE_SECS",
                    DEFAULT_REQUEST_DEADLINE_SECS,
                )),
                dump_path: PathBuf::from(env_or("HELLE_DUMP_PATH", DEFAULT_DUMP_PATH)),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn with_default_fmisid(mut self, fmisid: Option<String>) -> Self {
            if let Some(fmisid) = fmisid.filter(|s| !s.trim().is_empty()) {
                self.default_fmisid = fmisid;
            }
            self
        }
    }

    fn env_or(key: &str, default: &str) -> String {
        std::env::var(key)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    fn secs_or(key: &str, default: u64) -> u64 {
        std::env::var(key)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(default)
    }

}
