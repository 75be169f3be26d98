//! Path prefix arithmetic for time-partitioned datasets.
//!
//! Datasets lay objects out under `dataset/yyyy/mm/dd/hh/...`. A retention
//! window is turned into the smallest set of path prefixes that covers it:
//! whole years where a year fits, then months, days, and hours at the
//! ragged edges.

use chrono::{DateTime, Datelike, Days, Months, Timelike, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrefixError {
    #[error("Window upper bound {upper} precedes lower bound {lower}")]
    ReversedBounds {
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    },
}

/// Generate the covering prefixes for `[lower, upper)` under `base`.
///
/// The upper bound is truncated to the whole hour first; a partial hour
/// has no complete `hh` partition to name. Bounds are interpreted in UTC,
/// matching the dataset layout.
pub fn time_prefixes(
    base: &str,
    lower: DateTime<Utc>,
    upper: DateTime<Utc>,
) -> Result<Vec<String>, PrefixError> {
    if upper < lower {
        return Err(PrefixError::ReversedBounds { lower, upper });
    }

    let upper = upper
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(upper);

    let mut prefixes = Vec::new();
    let mut cursor = lower;

    while cursor < upper {
        let (next, formatted) = if cursor + Months::new(12) <= upper {
            (cursor + Months::new(12), cursor.format("%Y").to_string())
        } else if cursor + Months::new(1) <= upper {
            (cursor + Months::new(1), cursor.format("%Y/%m").to_string())
        } else if cursor + Days::new(1) <= upper {
            (
                cursor + Days::new(1),
                cursor.format("%Y/%m/%d").to_string(),
            )
        } else {
            (
                cursor + chrono::Duration::hours(1),
                cursor.format("%Y/%m/%d/%H").to_string(),
            )
        };

        prefixes.push(format!("{base}/{formatted}"));
        cursor = next;
    }

    Ok(prefixes)
}

/// Bucket component of a storage name, with any `scheme://` stripped.
pub fn bucket_name(data_storage_name: &str) -> &str {
    let stripped = strip_scheme(data_storage_name);
    stripped.split('/').next().unwrap_or(stripped)
}

/// Dataset path inside the bucket, if the storage name has one.
pub fn dataset_path(data_storage_name: &str) -> Option<&str> {
    let stripped = strip_scheme(data_storage_name);
    match stripped.split_once('/') {
        Some((_, rest)) if !rest.is_empty() => Some(rest),
        _ => None,
    }
}

/// Dataset path as a delete prefix: trailing slash so `ds` cannot match
/// an unrelated `ds-archive`.
pub fn delete_prefix(data_storage_name: &str) -> Option<String> {
    dataset_path(data_storage_name).map(|p| format!("{}/", p.trim_end_matches('/')))
}

fn strip_scheme(name: &str) -> &str {
    match name.split_once("://") {
        Some((_, rest)) => rest,
        None => name,
    }
}

/// Drop prefixes already covered by a shorter one and sort the rest.
/// `a/` covers `a/b/`; job include lists stay minimal under the prefix
/// count cap.
pub fn consolidate(mut prefixes: Vec<String>) -> Vec<String> {
    prefixes.sort();
    prefixes.dedup();

    let mut kept: Vec<String> = Vec::with_capacity(prefixes.len());
    for prefix in prefixes {
        if !kept.iter().any(|k| prefix.starts_with(k.as_str())) {
            kept.push(prefix);
        }
    }
    kept
}

/// Queue ordering demotes a request one band per failed attempt, so
/// chronically failing work cannot crowd out fresh requests while still
/// being retried ahead of nothing.
pub fn requeue_priority(number_of_retry: i32) -> i64 {
    -i64::from(number_of_retry)
}
