//! Portfolio projections: rating filter chips, sort order, tag search,
//! bookmarks

use std::cmp::Ordering;
use std::str::FromStr;

use crate::state::data::Record;
use crate::state::error::ParseError;

/// Rating filter chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RatingFilter {
    #[default]
    All,
    /// Exactly this many stars
    Stars(u8),
}

impl RatingFilter {
    pub fn matches(self, record: &Record) -> bool {
        match self {
            RatingFilter::All => true,
            RatingFilter::Stars(n) => record.rating == Some(n),
        }
    }
}

impl FromStr for RatingFilter {
    type Err = ParseError;

    /// Accepts `All`, `3★` and `3`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(RatingFilter::All);
        }
        match s.trim_end_matches('★').parse::<u8>() {
            Ok(n) if (1..=5).contains(&n) => Ok(RatingFilter::Stars(n)),
            _ => Err(ParseError::Rating(s.to_string())),
        }
    }
}

/// Sort order of the works list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Newest display date first
    #[default]
    Latest,
    /// Title, ascending
    Name,
}

impl SortKey {
    /// The other order (the sort toggle button)
    pub fn toggled(self) -> Self {
        match self {
            SortKey::Latest => SortKey::Name,
            SortKey::Name => SortKey::Latest,
        }
    }
}

impl FromStr for SortKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest" => Ok(SortKey::Latest),
            "name" => Ok(SortKey::Name),
            _ => Err(ParseError::SortKey(s.to_string())),
        }
    }
}

/// Apply the rating filter, then order by `sort_key`.
///
/// `Latest` puts records with an unreadable date last; ties keep input order.
pub fn filter_and_sort(records: &[Record], rating: RatingFilter, sort_key: SortKey) -> Vec<Record> {
    let mut works: Vec<Record> = records.iter().filter(|r| rating.matches(r)).cloned().collect();

    match sort_key {
        SortKey::Latest => works.sort_by(|a, b| match (a.sort_date(), b.sort_date()) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
        SortKey::Name => works.sort_by(|a, b| title(a).cmp(title(b))),
    }
    works
}

fn title(record: &Record) -> &str {
    record.title.as_deref().unwrap_or_default()
}

/// Records carrying every tag in `tags`, in input order.
///
/// Matching ignores tag order; an empty query matches everything.
pub fn search_by_tags<S: AsRef<str>>(records: &[Record], tags: &[S]) -> Vec<Record> {
    records
        .iter()
        .filter(|r| tags.iter().all(|t| r.has_tag(t.as_ref().trim())))
        .cloned()
        .collect()
}

/// Bookmarked records, in input order
pub fn bookmarked(records: &[Record]) -> Vec<Record> {
    records.iter().filter(|r| r.bookmarked).cloned().collect()
}

/// Mean star rating over rated records, `None` when nothing is rated
pub fn average_rating(records: &[Record]) -> Option<f64> {
    let ratings: Vec<f64> = records.iter().filter_map(|r| r.rating).map(f64::from).collect();
    if ratings.is_empty() {
        return None;
    }
    Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
}
