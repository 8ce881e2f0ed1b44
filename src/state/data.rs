//! Shared data structures for the application state
//!
//! These structs represent the data model that flows between
//! the snapshot slot, the record store and the views.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{ParseError, StoreError};
use crate::region::split_address;

/// Opaque record identifier, unique for the lifetime of the collection
///
/// Written as a string. Integer ids (`Date.now()` in older snapshots) are
/// accepted on load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        RecordId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of time-based ids, used to seed the id generator
    pub(crate) fn as_millis(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId(id.to_string())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl<'de> Visitor<'de> for IdVisitor {
            type Value = RecordId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or integer id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<RecordId, E> {
                Ok(RecordId::from(v))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<RecordId, E> {
                Ok(RecordId(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<RecordId, E> {
                Ok(RecordId(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<RecordId, E> {
                Ok(RecordId(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<RecordId, E> {
                if v.is_finite() && v.fract() == 0.0 {
                    Ok(RecordId(format!("{:.0}", v)))
                } else {
                    Err(E::invalid_value(de::Unexpected::Float(v), &self))
                }
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

/// Lifecycle of a record
///
/// `PendingReview -> Confirmed -> Collected`. The store accepts any status;
/// callers are expected to move forward only. Jumping straight from
/// `PendingReview` to `Collected` is an allowed fast path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    #[serde(alias = "확인 대기 중")]
    PendingReview,
    #[serde(alias = "확인됨")]
    Confirmed,
    #[serde(alias = "수거완료")]
    Collected,
}

impl Status {
    /// Every status, in lifecycle order
    pub const ALL: [Status; 3] = [Status::PendingReview, Status::Confirmed, Status::Collected];

    pub const INITIAL: Status = Status::PendingReview;

    pub fn is_terminal(self) -> bool {
        self == Status::Collected
    }

    /// The next lifecycle step, or `None` once collected
    pub fn next(self) -> Option<Status> {
        match self {
            Status::PendingReview => Some(Status::Confirmed),
            Status::Confirmed => Some(Status::Collected),
            Status::Collected => None,
        }
    }

    /// Forward-only caller contract: any strictly later status is allowed.
    pub fn can_transition_to(self, to: Status) -> bool {
        to > self
    }

    /// Label shown by the reporting app
    pub fn label(self) -> &'static str {
        match self {
            Status::PendingReview => "확인 대기 중",
            Status::Confirmed => "확인됨",
            Status::Collected => "수거완료",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Status {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "PendingReview" | "확인 대기 중" => Ok(Status::PendingReview),
            "Confirmed" | "확인됨" => Ok(Status::Confirmed),
            "Collected" | "수거완료" => Ok(Status::Collected),
            other => Err(ParseError::Status(other.to_string())),
        }
    }
}

/// Represents a single user-submitted item (trash report or art work)
///
/// Loading is lenient (see `StoredRecord`): works saved by the portfolio
/// app carry no address, status or `createdAt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredRecord")]
pub struct Record {
    pub id: RecordId,
    /// Attachment reference (image URI), opaque to the store
    pub image: String,
    /// Free-text address
    pub address: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,

    // ========== Location (reporting variant) ==========
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// First address token, empty when unknown
    #[serde(skip_serializing_if = "String::is_empty")]
    pub region: String,
    /// Second address token, empty when unknown
    #[serde(skip_serializing_if = "String::is_empty")]
    pub district: String,

    // ========== Portfolio variant ==========
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Display date, `YYYY.MM.DD`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Star rating, 1 to 5
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    /// Tag set; order is kept for display only
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    /// Small preview image; older works carry only this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub bookmarked: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// On-disk shape accepted when loading a snapshot
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    id: RecordId,
    image: Option<String>,
    thumbnail: Option<String>,
    address: Option<String>,
    status: Option<Status>,
    created_at: Option<DateTime<Utc>>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    region: Option<String>,
    district: Option<String>,
    title: Option<String>,
    date: Option<String>,
    rating: Option<u8>,
    tags: Option<Vec<String>>,
    category: Option<String>,
    review: Option<String>,
    #[serde(default)]
    bookmarked: bool,
}

impl From<StoredRecord> for Record {
    /// Missing status is the initial one. A missing `createdAt` comes from
    /// the display date (midnight UTC), else the Unix epoch.
    fn from(stored: StoredRecord) -> Self {
        let created_at = stored
            .created_at
            .or_else(|| {
                stored
                    .date
                    .as_deref()
                    .and_then(parse_display_date)
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|naive| Utc.from_utc_datetime(&naive))
            })
            .unwrap_or_default();

        Record {
            id: stored.id,
            image: stored
                .image
                .or_else(|| stored.thumbnail.clone())
                .unwrap_or_default(),
            address: stored.address.unwrap_or_default(),
            status: stored.status.unwrap_or(Status::INITIAL),
            created_at,
            latitude: stored.latitude,
            longitude: stored.longitude,
            region: stored.region.unwrap_or_default(),
            district: stored.district.unwrap_or_default(),
            title: stored.title,
            date: stored.date,
            rating: stored.rating,
            tags: stored.tags.unwrap_or_default(),
            category: stored.category,
            review: stored.review,
            thumbnail: stored.thumbnail,
            bookmarked: stored.bookmarked,
        }
    }
}

impl Record {
    /// Date used for "latest first" ordering: the display date when it
    /// parses, otherwise the creation date. `None` when the display date
    /// is present but unreadable.
    pub fn sort_date(&self) -> Option<NaiveDate> {
        match &self.date {
            Some(date) => parse_display_date(date),
            None => Some(self.created_at.date_naive()),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Parse `YYYY.MM.DD` (or `YYYY-MM-DD`) display dates
pub fn parse_display_date(date: &str) -> Option<NaiveDate> {
    let date = date.trim();
    NaiveDate::parse_from_str(date, "%Y.%m.%d")
        .or_else(|_| NaiveDate::parse_from_str(date, "%Y-%m-%d"))
        .ok()
}

/// Location fix from the host's location capability
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Reverse-geocoded address, if the lookup succeeded
    pub address: Option<String>,
}

impl GeoFix {
    /// Join reverse-geocoding parts (region, district, street, name),
    /// skipping blanks.
    pub fn address_from_parts<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
        let joined = parts
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!joined.is_empty()).then_some(joined)
    }
}

/// Fields supplied by a submission
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRecord {
    pub image: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub title: Option<String>,
    pub date: Option<String>,
    pub rating: Option<u8>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub review: Option<String>,
}

impl NewRecord {
    pub fn new(image: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            address: address.into(),
            ..Self::default()
        }
    }

    /// Apply a location fix. A failed lookup (`None`) leaves the fields absent.
    pub fn with_fix(mut self, fix: Option<GeoFix>) -> Self {
        if let Some(fix) = fix {
            self.latitude = Some(fix.latitude);
            self.longitude = Some(fix.longitude);
            if self.address.trim().is_empty() {
                if let Some(address) = fix.address {
                    self.address = address;
                }
            }
        }
        self
    }

    /// Check required fields and ranges
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.image.trim().is_empty() {
            return Err(StoreError::validation("image", "an attachment is required"));
        }
        if self.address.trim().is_empty() {
            return Err(StoreError::validation("address", "a location is required"));
        }
        validate_rating(self.rating)
    }

    /// Build the record. Assumes `validate` passed.
    pub(crate) fn into_record(self, id: RecordId, created_at: DateTime<Utc>) -> Record {
        let address = self.address.trim().to_string();
        let (region, district) = split_address(&address);
        Record {
            id,
            image: self.image,
            address,
            status: Status::INITIAL,
            created_at,
            latitude: self.latitude,
            longitude: self.longitude,
            region,
            district,
            title: self.title,
            date: self.date,
            rating: self.rating,
            tags: normalize_tags(self.tags),
            category: self.category,
            review: self.review,
            thumbnail: None,
            bookmarked: false,
        }
    }
}

pub(crate) fn validate_rating(rating: Option<u8>) -> Result<(), StoreError> {
    match rating {
        Some(r) if !(1..=5).contains(&r) => Err(StoreError::validation(
            "rating",
            format!("{} is outside 1..=5", r),
        )),
        _ => Ok(()),
    }
}

/// Trim tags, drop blanks and duplicates, keep first-seen order
pub(crate) fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Field update; `None` leaves a field unchanged
///
/// Optional fields take `Some(None)` to clear them. An empty `region`,
/// `district` or `tags` clears those. `id`, `createdAt`, `status` and
/// `bookmarked` cannot be patched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub image: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<Option<f64>>,
    pub longitude: Option<Option<f64>>,
    pub region: Option<String>,
    pub district: Option<String>,
    pub title: Option<Option<String>>,
    pub date: Option<Option<String>>,
    pub rating: Option<Option<u8>>,
    pub tags: Option<Vec<String>>,
    pub category: Option<Option<String>>,
    pub review: Option<Option<String>>,
}

impl RecordPatch {
    pub fn validate(&self) -> Result<(), StoreError> {
        if matches!(&self.image, Some(image) if image.trim().is_empty()) {
            return Err(StoreError::validation("image", "an attachment is required"));
        }
        if matches!(&self.address, Some(address) if address.trim().is_empty()) {
            return Err(StoreError::validation("address", "a location is required"));
        }
        validate_rating(self.rating.flatten())
    }

    /// Merge into `record`. A new address re-derives region and district
    /// unless the patch sets them explicitly.
    pub(crate) fn apply(self, record: &mut Record) {
        if let Some(image) = self.image {
            record.image = image;
        }
        if let Some(address) = self.address {
            let address = address.trim().to_string();
            if address != record.address {
                let (region, district) = split_address(&address);
                record.region = region;
                record.district = district;
            }
            record.address = address;
        }
        if let Some(region) = self.region {
            record.region = region;
        }
        if let Some(district) = self.district {
            record.district = district;
        }
        if let Some(latitude) = self.latitude {
            record.latitude = latitude;
        }
        if let Some(longitude) = self.longitude {
            record.longitude = longitude;
        }
        if let Some(title) = self.title {
            record.title = title;
        }
        if let Some(date) = self.date {
            record.date = date;
        }
        if let Some(rating) = self.rating {
            record.rating = rating;
        }
        if let Some(tags) = self.tags {
            record.tags = normalize_tags(tags);
        }
        if let Some(category) = self.category {
            record.category = category;
        }
        if let Some(review) = self.review {
            record.review = review;
        }
    }
}

/// Exact-match predicates for `RecordStore::list`; `None` matches anything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub region: Option<String>,
    pub district: Option<String>,
    pub status: Option<Status>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.region.as_deref().map_or(true, |r| record.region == r)
            && self.district.as_deref().map_or(true, |d| record.district == d)
            && self.status.map_or(true, |s| record.status == s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(address: &str) -> Record {
        NewRecord::new("file:///trash.jpg", address)
            .into_record(RecordId::new("1"), Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap())
    }

    #[test]
    fn test_status_lifecycle() {
        assert_eq!(Status::PendingReview.next(), Some(Status::Confirmed));
        assert_eq!(Status::Confirmed.next(), Some(Status::Collected));
        assert_eq!(Status::Collected.next(), None);
        assert!(Status::Collected.is_terminal());

        assert!(Status::PendingReview.can_transition_to(Status::Collected));
        assert!(!Status::Collected.can_transition_to(Status::Confirmed));
        assert!(!Status::Confirmed.can_transition_to(Status::Confirmed));
    }

    #[test]
    fn test_status_accepts_legacy_labels() {
        let status: Status = serde_json::from_str("\"확인됨\"").unwrap();
        assert_eq!(status, Status::Confirmed);
        assert_eq!(serde_json::to_string(&Status::Collected).unwrap(), "\"Collected\"");
        assert_eq!("수거완료".parse::<Status>().unwrap(), Status::Collected);
        assert!("Lost".parse::<Status>().is_err());
    }

    #[test]
    fn test_validation() {
        assert!(NewRecord::new("img", "제주시 연동").validate().is_ok());

        let err = NewRecord::new("", "제주시 연동").validate().unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "image", .. }));

        let err = NewRecord::new("img", "   ").validate().unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "address", .. }));

        let mut bad_rating = NewRecord::new("img", "gallery");
        bad_rating.rating = Some(6);
        assert!(matches!(
            bad_rating.validate(),
            Err(StoreError::Validation { field: "rating", .. })
        ));
    }

    #[test]
    fn test_region_derived_at_creation() {
        let r = record("제주시 애월읍 애월해안로");
        assert_eq!(r.region, "제주시");
        assert_eq!(r.district, "애월읍");
        assert_eq!(r.status, Status::PendingReview);

        let r = record("harbor");
        assert_eq!(r.region, "harbor");
        assert!(r.district.is_empty());
    }

    #[test]
    fn test_with_fix() {
        let fix = GeoFix {
            latitude: 33.4996,
            longitude: 126.5312,
            address: GeoFix::address_from_parts([Some("제주시"), Some(" "), Some("연동"), None]),
        };
        let new = NewRecord::new("img", "").with_fix(Some(fix));
        assert_eq!(new.address, "제주시 연동");
        assert_eq!(new.latitude, Some(33.4996));

        let new = NewRecord::new("img", "서귀포시").with_fix(None);
        assert_eq!(new.latitude, None);
        assert_eq!(new.address, "서귀포시");
    }

    #[test]
    fn test_patch_rederives_region() {
        let mut r = record("제주시 연동");
        RecordPatch {
            address: Some("서귀포시 중문동 관광로".to_string()),
            ..RecordPatch::default()
        }
        .apply(&mut r);
        assert_eq!(r.region, "서귀포시");
        assert_eq!(r.district, "중문동");

        RecordPatch {
            address: Some("제주시 노형동".to_string()),
            district: Some("연동".to_string()),
            ..RecordPatch::default()
        }
        .apply(&mut r);
        assert_eq!(r.region, "제주시");
        assert_eq!(r.district, "연동");
    }

    #[test]
    fn test_tags_normalized() {
        let tags = normalize_tags(vec![" 그림".into(), "일본".into(), "그림".into(), "".into()]);
        assert_eq!(tags, vec!["그림".to_string(), "일본".to_string()]);
    }

    #[test]
    fn test_sort_date() {
        let mut r = record("gallery");
        assert_eq!(r.sort_date(), NaiveDate::from_ymd_opt(2024, 5, 1));
        r.date = Some("2023.12.25".to_string());
        assert_eq!(r.sort_date(), NaiveDate::from_ymd_opt(2023, 12, 25));
        r.date = Some("someday".to_string());
        assert_eq!(r.sort_date(), None);
    }

    #[test]
    fn test_snapshot_field_names() {
        let json = serde_json::to_value(record("제주시 연동")).unwrap();
        assert_eq!(json["createdAt"], "2024-05-01T09:00:00Z");
        assert_eq!(json["district"], "연동");
        assert!(json.get("rating").is_none());
        assert!(json.get("tags").is_none());
        assert!(json.get("bookmarked").is_none());
        assert!(json.get("thumbnail").is_none());
    }

    #[test]
    fn test_record_id_accepts_numbers() {
        let id: RecordId = serde_json::from_str("1717243200000").unwrap();
        assert_eq!(id.as_str(), "1717243200000");
        let id: RecordId = serde_json::from_str("3.0").unwrap();
        assert_eq!(id.as_str(), "3");
        assert!(serde_json::from_str::<RecordId>("2.5").is_err());
        assert!(serde_json::from_str::<RecordId>("true").is_err());
        assert_eq!(serde_json::to_string(&RecordId::from("7")).unwrap(), "\"7\"");
    }

    #[test]
    fn test_sparse_entry_gets_defaults() {
        let r: Record = serde_json::from_str(
            r#"{"id":4,"title":"Dunes","date":"2023-08-14","thumbnail":"/t/4.jpg","bookmarked":true}"#,
        )
        .unwrap();
        assert_eq!(r.id, RecordId::from("4"));
        assert_eq!(r.status, Status::PendingReview);
        assert_eq!(r.image, "/t/4.jpg");
        assert_eq!(r.thumbnail.as_deref(), Some("/t/4.jpg"));
        assert_eq!(r.created_at, Utc.with_ymd_and_hms(2023, 8, 14, 0, 0, 0).unwrap());
        assert!(r.bookmarked);
        assert!(r.address.is_empty() && r.region.is_empty());

        let r: Record = serde_json::from_str(r#"{"id":"x","date":"someday"}"#).unwrap();
        assert_eq!(r.created_at, DateTime::<Utc>::default());
        assert!(r.image.is_empty());

        assert!(serde_json::from_str::<Record>(r#"{"title":"no id"}"#).is_err());
    }

    #[test]
    fn test_patch_clears_and_keeps() {
        let mut r = record("gallery");
        r.title = Some("Tide".to_string());
        r.rating = Some(3);
        r.category = Some("photo".to_string());

        let patch = RecordPatch {
            rating: Some(None),
            category: Some(None),
            ..RecordPatch::default()
        };
        assert!(patch.validate().is_ok());
        patch.apply(&mut r);
        assert_eq!(r.rating, None);
        assert_eq!(r.category, None);
        assert_eq!(r.title.as_deref(), Some("Tide"));

        let bad = RecordPatch { rating: Some(Some(9)), ..RecordPatch::default() };
        assert!(matches!(bad.validate(), Err(StoreError::Validation { field: "rating", .. })));
    }
}
