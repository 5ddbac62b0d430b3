//! District and demographic classification
//!
//! Pure label extraction used while grouping aggregates:
//! - administrative district from a free-text location string
//! - age bracket and sex labels from profile fields
//! - hour-of-day reporting windows with a fixed output order
//!
//! Unknown or missing values map to sentinel labels; rows are never dropped
//! for being unclassifiable.

/// Sentinel district for locations without a recognizable district token
pub const DISTRICT_FALLBACK: &str = "기타";

/// Sentinel for unmapped demographic values
pub const OTHER_LABEL: &str = "other";

/// Suffix character that terminates an administrative district name
const DISTRICT_SUFFIX: char = '구';

/// Fixed reporting order for hour-of-day windows; unknown labels sort after
/// every listed window.
pub const WINDOW_ORDER: [&str; 7] = [
    "03-06", "06-09", "09-12", "12-15", "15-18", "18-21", "21-24",
];

/// Extract the district name from a free-text location string.
///
/// Precedence: the first whitespace-delimited token containing the district
/// suffix wins, truncated at (and including) its first suffix character. A
/// string without any whitespace is searched whole. Anything else falls back
/// to [`DISTRICT_FALLBACK`].
pub fn district_label(location: &str) -> String {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return DISTRICT_FALLBACK.to_string();
    }

    for token in trimmed.split_whitespace() {
        if let Some(district) = truncate_at_suffix(token) {
            return district;
        }
    }

    // no whitespace-delimited token matched; a token-free string was already
    // covered above since a single token is the whole string
    DISTRICT_FALLBACK.to_string()
}

/// Substring of `token` up to and including its first district suffix.
fn truncate_at_suffix(token: &str) -> Option<String> {
    token
        .find(DISTRICT_SUFFIX)
        .map(|idx| token[..idx + DISTRICT_SUFFIX.len_utf8()].to_string())
}

/// Age bracket label for demographic grouping.
pub fn age_bracket(age: Option<i32>) -> &'static str {
    match age {
        Some(a) if (20..30).contains(&a) => "20s",
        Some(a) if (30..40).contains(&a) => "30s",
        Some(a) if (40..50).contains(&a) => "40s",
        Some(a) if a >= 50 => "50s+",
        _ => OTHER_LABEL,
    }
}

/// Normalized sex label for demographic grouping.
pub fn sex_label(sex: Option<&str>) -> &'static str {
    match sex.map(|s| s.trim().to_lowercase()) {
        Some(ref s) if s == "남" || s == "m" || s == "male" => "male",
        Some(ref s) if s == "여" || s == "f" || s == "female" => "female",
        _ => OTHER_LABEL,
    }
}

/// Combined demographic group key, e.g. "30s/female".
pub fn demographic_label(age: Option<i32>, sex: Option<&str>) -> String {
    format!("{}/{}", age_bracket(age), sex_label(sex))
}

/// Hour-of-day reporting window label.
///
/// Six fixed 3-hour windows from 03:00 plus the 21-24 tail; hours outside
/// them (0-2) report as [`OTHER_LABEL`].
pub fn hour_window(hour: Option<u32>) -> &'static str {
    match hour {
        Some(h) if (3..6).contains(&h) => "03-06",
        Some(h) if (6..9).contains(&h) => "06-09",
        Some(h) if (9..12).contains(&h) => "09-12",
        Some(h) if (12..15).contains(&h) => "12-15",
        Some(h) if (15..18).contains(&h) => "15-18",
        Some(h) if (18..21).contains(&h) => "18-21",
        Some(h) if (21..24).contains(&h) => "21-24",
        _ => OTHER_LABEL,
    }
}

/// Sort rank of a window label per [`WINDOW_ORDER`]; unknown labels last.
pub fn window_rank(label: &str) -> usize {
    WINDOW_ORDER
        .iter()
        .position(|w| *w == label)
        .unwrap_or(WINDOW_ORDER.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_district_from_city_prefixed_location() {
        assert_eq!(district_label("부산시 해운대구"), "해운대구");
    }

    #[test]
    fn test_district_from_bare_token() {
        assert_eq!(district_label("해운대구"), "해운대구");
    }

    #[test]
    fn test_district_fallback_without_suffix() {
        assert_eq!(district_label("부산시"), DISTRICT_FALLBACK);
        assert_eq!(district_label(""), DISTRICT_FALLBACK);
        assert_eq!(district_label("   "), DISTRICT_FALLBACK);
    }

    #[test]
    fn test_district_truncates_trailing_detail() {
        // token text after the first suffix character is discarded
        assert_eq!(district_label("부산시 해운대구우동"), "해운대구");
        assert_eq!(district_label("부산시 해운대구 우동 123"), "해운대구");
    }

    #[test]
    fn test_district_first_matching_token_wins() {
        assert_eq!(district_label("동래구 해운대구"), "동래구");
    }

    #[test]
    fn test_age_brackets() {
        assert_eq!(age_bracket(Some(19)), OTHER_LABEL);
        assert_eq!(age_bracket(Some(20)), "20s");
        assert_eq!(age_bracket(Some(29)), "20s");
        assert_eq!(age_bracket(Some(30)), "30s");
        assert_eq!(age_bracket(Some(39)), "30s");
        assert_eq!(age_bracket(Some(40)), "40s");
        assert_eq!(age_bracket(Some(49)), "40s");
        assert_eq!(age_bracket(Some(50)), "50s+");
        assert_eq!(age_bracket(Some(87)), "50s+");
        assert_eq!(age_bracket(None), OTHER_LABEL);
    }

    #[test]
    fn test_sex_labels() {
        assert_eq!(sex_label(Some("남")), "male");
        assert_eq!(sex_label(Some("여")), "female");
        assert_eq!(sex_label(Some("M")), "male");
        assert_eq!(sex_label(Some("female")), "female");
        assert_eq!(sex_label(Some("unknown")), OTHER_LABEL);
        assert_eq!(sex_label(None), OTHER_LABEL);
    }

    #[test]
    fn test_demographic_label_composition() {
        assert_eq!(demographic_label(Some(34), Some("여")), "30s/female");
        assert_eq!(demographic_label(None, None), "other/other");
    }

    #[test]
    fn test_hour_windows() {
        assert_eq!(hour_window(Some(0)), OTHER_LABEL);
        assert_eq!(hour_window(Some(2)), OTHER_LABEL);
        assert_eq!(hour_window(Some(3)), "03-06");
        assert_eq!(hour_window(Some(8)), "06-09");
        assert_eq!(hour_window(Some(11)), "09-12");
        assert_eq!(hour_window(Some(14)), "12-15");
        assert_eq!(hour_window(Some(17)), "15-18");
        assert_eq!(hour_window(Some(20)), "18-21");
        assert_eq!(hour_window(Some(21)), "21-24");
        assert_eq!(hour_window(Some(23)), "21-24");
        assert_eq!(hour_window(Some(24)), OTHER_LABEL);
        assert_eq!(hour_window(None), OTHER_LABEL);
    }

    #[test]
    fn test_window_rank_order() {
        assert_eq!(window_rank("03-06"), 0);
        assert_eq!(window_rank("21-24"), 6);
        assert_eq!(window_rank(OTHER_LABEL), WINDOW_ORDER.len());
        assert!(window_rank("03-06") < window_rank("21-24"));
        assert!(window_rank("21-24") < window_rank(OTHER_LABEL));
    }
}
