//! Decoding of feature-collection payloads and folding them into daily aggregates.
//!
//! Only the envelope is fatal: a payload that is not a WFS feature collection fails the
//! request, while individual bad records are skipped and reported in [`FoldOutcome`].

pub mod feature_collection;
pub mod fold;

pub use feature_collection::{decode, EnvelopeError, FeatureCollection, ObservationRecord};
pub use fold::{fold_records, FoldOutcome, SkipReason, SkippedRecord};
