use crate::domain::weather::{AggregateMap, DailyAggregate};
use crate::parse::ObservationRecord;
use crate::time::{local_date_key, parse_instant};
use chrono::TimeZone;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnparsableValue(String),
    NotANumber,
    UnparsableTime(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnparsableValue(v) => write!(f, "failed to parse value: {v:?}"),
            SkipReason::NotANumber => write!(f, "value is NaN"),
            SkipReason::UnparsableTime(t) => write!(f, "failed to parse time: {t:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// Position of the record in the feature collection.
    pub index: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default)]
pub struct FoldOutcome {
    pub dates: AggregateMap,
    pub skipped: Vec<SkippedRecord>,
}

/// Folds observation records into per-local-date aggregates.
///
/// Records are applied in order, so a later `tmax`/`tday`/`tmin` for the same date replaces an
/// earlier one. A record whose value or time cannot be used is skipped without touching the
/// map; records with other parameter names still register their date.
pub fn fold_records<'a, Tz, I>(records: I, tz: &Tz) -> FoldOutcome
where
    Tz: TimeZone,
    I: IntoIterator<Item = &'a ObservationRecord>,
{
    let mut out = FoldOutcome::default();

    for (index, record) in records.into_iter().enumerate() {
        match apply_record(&mut out.dates, record, tz) {
            Ok(()) => {}
            Err(reason) => {
                tracing::warn!(index, %reason, "skipping observation record");
                out.skipped.push(SkippedRecord { index, reason });
            }
        }
    }

    out
}

fn apply_record<Tz: TimeZone>(
    dates: &mut AggregateMap,
    record: &ObservationRecord,
    tz: &Tz,
) -> Result<(), SkipReason> {
    let value = record
        .parameter_value
        .parse::<f64>()
        .map_err(|_| SkipReason::UnparsableValue(record.parameter_value.clone()))?;

    if value.is_nan() {
        return Err(SkipReason::NotANumber);
    }

    let instant = parse_instant(&record.time)
        .map_err(|_| SkipReason::UnparsableTime(record.time.clone()))?;

    let day = dates
        .entry(local_date_key(&instant, tz))
        .or_insert_with(DailyAggregate::unknown);

    match record.parameter_name.as_str() {
        "tmax" => day.max = value,
        "tday" => day.avg = value,
        "tmin" => day.min = value,
        _ => {}
    }

    Ok(())
}
