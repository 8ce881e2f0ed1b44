//! Address parsing and the Jeju administrative district directory
//!
//! Addresses are free text. The region and district are best-effort
//! tokens taken from the front of the address at creation time.

/// Administrative districts per city, as offered by the address search
pub const JEJU_DISTRICTS: &[(&str, &[&str])] = &[
    (
        "제주시",
        &[
            "한림읍", "애월읍", "구좌읍", "조천읍", "한경면", "추자면", "우도면",
            "일도1동", "일도2동", "이도1동", "이도2동", "삼도1동", "삼도2동",
            "용담1동", "용담2동", "건입동", "화북동", "삼양동", "봉개동", "아라동",
            "오라동", "연동", "노형동", "외도동", "이호동", "도두동",
        ],
    ),
    (
        "서귀포시",
        &[
            "대정읍", "남원읍", "성산읍", "안덕면", "표선면", "송산동", "정방동",
            "중앙동", "천지동", "효돈동", "영천동", "동홍동", "서홍동", "대륜동",
            "대천동", "중문동", "예래동",
        ],
    ),
];

/// The two top-level regions every region table reports on
pub const DEFAULT_REGIONS: [&str; 2] = ["제주시", "서귀포시"];

/// Split an address into its (region, district) tokens.
///
/// Both are empty strings when the address has fewer tokens.
pub fn split_address(address: &str) -> (String, String) {
    let mut parts = address.split_whitespace();
    let region = parts.next().unwrap_or_default().to_string();
    let district = parts.next().unwrap_or_default().to_string();
    (region, district)
}

/// Kind of a sub-region, read from its name suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DistrictKind {
    /// 읍
    Town,
    /// 면
    Township,
    /// 동, and anything unrecognized
    Neighborhood,
}

impl DistrictKind {
    pub fn classify(district: &str) -> Self {
        if district.contains('읍') {
            DistrictKind::Town
        } else if district.contains('면') {
            DistrictKind::Township
        } else {
            DistrictKind::Neighborhood
        }
    }
}

/// Search the district directory.
///
/// Returns `"<city> <district>"` for every district whose name contains `query`.
pub fn search_districts(query: &str) -> Vec<String> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    JEJU_DISTRICTS
        .iter()
        .flat_map(|(city, districts)| {
            districts
                .iter()
                .filter(move |d| d.contains(query))
                .map(move |d| format!("{} {}", city, d))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_address() {
        assert_eq!(
            split_address("제주시 애월읍 애월해안로 12"),
            ("제주시".to_string(), "애월읍".to_string())
        );
        assert_eq!(split_address("  서귀포시   "), ("서귀포시".to_string(), String::new()));
        assert_eq!(split_address(""), (String::new(), String::new()));
    }

    #[test]
    fn test_district_kind() {
        assert_eq!(DistrictKind::classify("애월읍"), DistrictKind::Town);
        assert_eq!(DistrictKind::classify("추자면"), DistrictKind::Township);
        assert_eq!(DistrictKind::classify("연동"), DistrictKind::Neighborhood);
        assert_eq!(DistrictKind::classify(""), DistrictKind::Neighborhood);
    }

    #[test]
    fn test_search_districts() {
        let hits = search_districts("애월");
        assert_eq!(hits, vec!["제주시 애월읍".to_string()]);

        let hits = search_districts("중");
        assert!(hits.contains(&"서귀포시 중앙동".to_string()));
        assert!(hits.contains(&"서귀포시 중문동".to_string()));

        assert!(search_districts("   ").is_empty());
        assert!(search_districts("서울").is_empty());
    }
}
