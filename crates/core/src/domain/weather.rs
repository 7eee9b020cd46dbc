use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Year used when the request carries no usable `year` parameter.
pub const DEFAULT_YEAR: &str = "2019";

/// A day is hot when its maximum temperature is strictly above this.
pub const HOT_DAY_THRESHOLD: f64 = 25.0;

/// Min/avg/max temperatures for one local calendar date.
///
/// Fields start out as NaN and are overwritten independently by `tmin`, `tday` and `tmax`
/// observations, so a day with partial data keeps NaN for the missing fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyAggregate {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

impl DailyAggregate {
    pub fn unknown() -> Self {
        Self {
            min: f64::NAN,
            avg: f64::NAN,
            max: f64::NAN,
        }
    }

    pub fn is_hot(&self) -> bool {
        // NaN compares false.
        self.max > HOT_DAY_THRESHOLD
    }
}

impl Default for DailyAggregate {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Local date (`YYYY-MM-DD`) to aggregate. Ordering is applied when rendering.
pub type AggregateMap = HashMap<String, DailyAggregate>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherQuery {
    pub fmisid: String,
    pub year: String,
}

impl WeatherQuery {
    /// Applies the request defaults: an empty station falls back to `default_fmisid`, a year
    /// that is not exactly four bytes long falls back to [`DEFAULT_YEAR`]. The year is not
    /// validated further.
    pub fn resolve(fmisid: Option<&str>, year: Option<&str>, default_fmisid: &str) -> Self {
        let fmisid = fmisid
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(default_fmisid)
            .to_string();

        let year = year
            .filter(|y| y.len() == 4)
            .unwrap_or(DEFAULT_YEAR)
            .to_string();

        Self { fmisid, year }
    }
}

/// Serializable view of one station-year, dates in chronological order.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherData {
    pub fmisid: String,
    pub year: String,
    pub hot_days: usize,
    pub dates: BTreeMap<String, DailyAggregate>,
}

impl WeatherData {
    pub fn new(query: &WeatherQuery, dates: &AggregateMap) -> Self {
        let dates: BTreeMap<String, DailyAggregate> =
            dates.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let hot_days = dates.values().filter(|d| d.is_hot()).count();
        Self {
            fmisid: query.fmisid.clone(),
            year: query.year.clone(),
            hot_days,
            dates,
        }
    }
}
