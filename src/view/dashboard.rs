use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::aggregate::{
    count_by_region, count_by_status, count_by_status_in_district, count_by_sub_region,
    district_kinds, newest_first, recent_completed_at, RegionKey,
};
use crate::region::{DistrictKind, DEFAULT_REGIONS};
use crate::state::config::StoreConfig;
use crate::state::data::{Record, Status};

/// Parameters of the status screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardOptions {
    pub known_regions: Vec<String>,
    pub recent_window_days: i64,
    /// Region whose districts are broken down (`None` = every district)
    pub selected_region: Option<String>,
    /// District drilled into for a per-status breakdown
    pub selected_district: Option<String>,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            known_regions: DEFAULT_REGIONS.iter().map(|r| r.to_string()).collect(),
            recent_window_days: 7,
            selected_region: None,
            selected_district: None,
        }
    }
}

impl From<&StoreConfig> for DashboardOptions {
    fn from(config: &StoreConfig) -> Self {
        Self {
            known_regions: config.known_regions.clone(),
            recent_window_days: config.recent_window_days,
            ..Self::default()
        }
    }
}

/// Every table the status screen renders, computed from one snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub computed_at: DateTime<Utc>,
    pub total: usize,
    pub by_status: BTreeMap<Status, usize>,
    pub by_region: BTreeMap<RegionKey, usize>,
    pub by_district: BTreeMap<String, usize>,
    pub district_kinds: BTreeMap<String, DistrictKind>,
    /// Status breakdown of `selected_district`, if one is selected
    pub district_detail: Option<BTreeMap<Status, usize>>,
    pub recent_completed: Vec<Record>,
    pub all_newest_first: Vec<Record>,
}

impl Dashboard {
    pub fn compute(records: &[Record], options: &DashboardOptions, now: DateTime<Utc>) -> Self {
        let by_district = count_by_sub_region(records, options.selected_region.as_deref());
        Dashboard {
            computed_at: now,
            total: records.len(),
            by_status: count_by_status(records),
            by_region: count_by_region(records, options.known_regions.as_slice()),
            district_kinds: district_kinds(&by_district),
            by_district,
            district_detail: options
                .selected_district
                .as_deref()
                .map(|district| count_by_status_in_district(records, district)),
            recent_completed: recent_completed_at(records, options.recent_window_days, now),
            all_newest_first: newest_first(records),
        }
    }

    /// Same tables, ignoring when they were computed
    pub fn same_tables(&self, other: &Dashboard) -> bool {
        Dashboard {
            computed_at: other.computed_at,
            ..self.clone()
        } == *other
    }
}
