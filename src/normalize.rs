//! Lenient parsing of hand-entered numbers. Nothing here fails: malformed
//! input degrades to an absent score or a zero count.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A Likert score in `1..=5`, or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Score(Option<u8>);

impl Score {
    pub const ABSENT: Score = Score(None);

    pub fn from_number(value: i64) -> Score {
        match value {
            1..=5 => Score(Some(value as u8)),
            _ => Score::ABSENT,
        }
    }

    pub fn parse(raw: &str) -> Score {
        parse_leading_int(raw)
            .map(Score::from_number)
            .unwrap_or(Score::ABSENT)
    }

    pub fn get(self) -> Option<u8> {
        self.0
    }

    /// Arithmetic value; absent counts as 0.
    pub fn value(self) -> u8 {
        self.0.unwrap_or(0)
    }

    pub fn is_valid(self) -> bool {
        self.0.is_some()
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value}"),
            None => Ok(()),
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Integer(i64),
            Float(f64),
            Text(String),
        }

        let score = match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Integer(value)) => Score::from_number(value),
            Some(Raw::Float(value)) if value.is_finite() => Score::from_number(value.trunc() as i64),
            Some(Raw::Float(_)) | None => Score::ABSENT,
            Some(Raw::Text(text)) => Score::parse(&text),
        };
        Ok(score)
    }
}

/// Student count as entered; anything non-numeric counts as 0.
pub fn parse_student_count(raw: &str) -> i64 {
    parse_leading_int(raw).unwrap_or(0)
}

/// Reads an optionally signed run of leading digits, ignoring leading
/// whitespace and any trailing text ("300 approx" -> 300, "4.5" -> 4).
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    let mut seen = false;
    for byte in digits.bytes() {
        if !byte.is_ascii_digit() {
            break;
        }
        seen = true;
        value = value
            .saturating_mul(10)
            .saturating_add(i64::from(byte - b'0'));
    }

    if !seen {
        return None;
    }
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_scores_parse() {
        for (raw, expected) in [("1", 1), ("3", 3), (" 5", 5), ("4.0", 4)] {
            assert_eq!(Score::parse(raw).get(), Some(expected));
        }
    }

    #[test]
    fn malformed_scores_degrade_to_absent() {
        for raw in ["", "   ", "abc", "0", "6", "-2", "n/a"] {
            let score = Score::parse(raw);
            assert!(!score.is_valid(), "{raw:?} should be absent");
            assert_eq!(score.value(), 0);
        }
    }

    #[test]
    fn student_counts_follow_leading_digits() {
        assert_eq!(parse_student_count("300"), 300);
        assert_eq!(parse_student_count("  420 students"), 420);
        assert_eq!(parse_student_count("12.9"), 12);
        assert_eq!(parse_student_count(""), 0);
        assert_eq!(parse_student_count("about 300"), 0);
        assert_eq!(parse_student_count("-5"), -5);
    }

    #[test]
    fn huge_counts_saturate_instead_of_overflowing() {
        assert_eq!(parse_student_count("99999999999999999999999"), i64::MAX);
    }

    #[test]
    fn scores_deserialize_from_strings_numbers_and_null() {
        let scores: Vec<Score> = serde_json::from_str(r#"["2", 4, null, "", 3.7, 9]"#).unwrap();
        let values: Vec<Option<u8>> = scores.into_iter().map(Score::get).collect();
        assert_eq!(values, vec![Some(2), Some(4), None, None, Some(3), None]);
    }

    #[test]
    fn scores_serialize_as_text() {
        let json = serde_json::to_string(&[Score::parse("5"), Score::ABSENT]).unwrap();
        assert_eq!(json, r#"["5",""]"#);
    }
}
