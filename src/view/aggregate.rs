//! Grouped counts and time-windowed projections for the status screen
//!
//! Every function takes the records as a slice and returns a fresh table.
//! An empty slice gives zero counts and empty sequences.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::fmt;

use crate::region::DistrictKind;
use crate::state::data::{Record, Status};

/// Row key of the region table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegionKey {
    Known(String),
    /// Any region outside the known set
    Other,
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKey::Known(region) => f.write_str(region),
            RegionKey::Other => f.write_str("기타"),
        }
    }
}

/// Count records per status. All statuses are present, zero-filled.
pub fn count_by_status(records: &[Record]) -> BTreeMap<Status, usize> {
    let mut counts: BTreeMap<Status, usize> = Status::ALL.iter().map(|s| (*s, 0)).collect();
    for record in records {
        *counts.entry(record.status).or_insert(0) += 1;
    }
    counts
}

/// Status breakdown of a single district (the drill-down table)
pub fn count_by_status_in_district(records: &[Record], district: &str) -> BTreeMap<Status, usize> {
    let in_district: Vec<Record> = records
        .iter()
        .filter(|r| r.district == district)
        .cloned()
        .collect();
    count_by_status(&in_district)
}

/// Count records per top-level region.
///
/// Every known region and `Other` are present, zero-filled. Records without
/// a region are left out.
pub fn count_by_region<S: AsRef<str>>(records: &[Record], known_regions: &[S]) -> BTreeMap<RegionKey, usize> {
    let mut counts: BTreeMap<RegionKey, usize> = known_regions
        .iter()
        .map(|r| (RegionKey::Known(r.as_ref().to_string()), 0))
        .collect();
    counts.insert(RegionKey::Other, 0);

    for record in records.iter().filter(|r| !r.region.is_empty()) {
        let key = if known_regions.iter().any(|k| k.as_ref() == record.region) {
            RegionKey::Known(record.region.clone())
        } else {
            RegionKey::Other
        };
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

/// Count records per district, optionally restricted to one region first.
///
/// Only districts that occur are listed. Records without a district are left out.
pub fn count_by_sub_region(records: &[Record], region: Option<&str>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        if record.district.is_empty() {
            continue;
        }
        if region.is_some_and(|region| record.region != region) {
            continue;
        }
        *counts.entry(record.district.clone()).or_insert(0) += 1;
    }
    counts
}

/// Kind of every district in a district table
pub fn district_kinds(counts: &BTreeMap<String, usize>) -> BTreeMap<String, DistrictKind> {
    counts
        .keys()
        .map(|district| (district.clone(), DistrictKind::classify(district)))
        .collect()
}

/// Collected records created within `window_days` before `now`, newest first.
///
/// The window is `[now - window_days, now]`; records stamped after `now`
/// (a clock that ran ahead) are left out.
pub fn recent_completed_at(records: &[Record], window_days: i64, now: DateTime<Utc>) -> Vec<Record> {
    let since = now - Duration::days(window_days);
    let mut recent: Vec<Record> = records
        .iter()
        .filter(|r| r.status.is_terminal() && r.created_at >= since && r.created_at <= now)
        .cloned()
        .collect();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent
}

/// `recent_completed_at` relative to the current time
pub fn recent_completed(records: &[Record], window_days: i64) -> Vec<Record> {
    recent_completed_at(records, window_days, Utc::now())
}

/// Every record, newest first (the admin list)
pub fn newest_first(records: &[Record]) -> Vec<Record> {
    let mut all = records.to_vec();
    all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    all
}
