//! Term labels ("Fall 2024-2025") and their canonical ordering.
//!
//! This is the only place a term label is parsed. Everything that sorts or
//! groups by term goes through [`TermKey`].

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Testing season within an academic year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Season {
    Fall,
    Winter,
    Spring,
}

impl Season {
    /// Position within the academic year (Fall = 0).
    pub fn ordinal(self) -> u8 {
        match self {
            Season::Fall => 0,
            Season::Winter => 1,
            Season::Spring => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Season::Fall => "Fall",
            Season::Winter => "Winter",
            Season::Spring => "Spring",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = TermParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fall" => Ok(Season::Fall),
            "winter" => Ok(Season::Winter),
            "spring" => Ok(Season::Spring),
            _ => Err(TermParseError::UnknownSeason(s.trim().to_string())),
        }
    }
}

/// Why a term label could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TermParseError {
    #[error("term label is empty")]
    Empty,

    #[error("expected \"Season YYYY-YYYY\", got \"{0}\"")]
    Malformed(String),

    #[error("unknown season \"{0}\" (expected Fall, Winter or Spring)")]
    UnknownSeason(String),

    #[error("academic year {start}-{end} does not span consecutive years")]
    NonConsecutiveYears { start: u16, end: u16 },
}

/// Sortable key for a term: academic-year start, then season.
///
/// `Ord` is chronological: Fall 2024-2025 < Winter 2024-2025 <
/// Spring 2024-2025 < Fall 2025-2026.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TermKey {
    pub year_start: u16,
    pub season: Season,
}

impl TermKey {
    pub fn new(season: Season, year_start: u16) -> Self {
        Self { year_start, season }
    }

    /// Parse a `"(Fall|Winter|Spring) YYYY-YYYY"` label.
    pub fn parse(label: &str) -> Result<Self, TermParseError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(TermParseError::Empty);
        }

        let mut parts = label.split_whitespace();
        let (Some(season), Some(years), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(TermParseError::Malformed(label.to_string()));
        };

        let season: Season = season.parse()?;

        let Some((start, end)) = years.split_once('-') else {
            return Err(TermParseError::Malformed(label.to_string()));
        };
        let start = parse_year(start).ok_or_else(|| TermParseError::Malformed(label.to_string()))?;
        let end = parse_year(end).ok_or_else(|| TermParseError::Malformed(label.to_string()))?;
        if end != start + 1 {
            return Err(TermParseError::NonConsecutiveYears { start, end });
        }

        Ok(Self::new(season, start))
    }

    /// `"2024-2025"`.
    pub fn academic_year(&self) -> String {
        format!("{}-{}", self.year_start, self.year_start + 1)
    }

    /// The same season one academic year later.
    pub fn next_year(&self) -> Self {
        Self::new(self.season, self.year_start + 1)
    }
}

fn parse_year(s: &str) -> Option<u16> {
    if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl Ord for TermKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.year_start
            .cmp(&other.year_start)
            .then(self.season.ordinal().cmp(&other.season.ordinal()))
    }
}

impl PartialOrd for TermKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TermKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.season, self.academic_year())
    }
}

impl FromStr for TermKey {
    type Err = TermParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TermKey::parse(s)
    }
}

// Serialized as the canonical label so JSON stays human-readable.
impl Serialize for TermKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TermKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TermKey::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Compare two raw labels chronologically. Unparseable labels sort after
/// every valid one and among themselves lexically.
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    match (TermKey::parse(a), TermKey::parse(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Sort raw labels chronologically in place.
pub fn sort_labels<S: AsRef<str>>(labels: &mut [S]) {
    labels.sort_by(|a, b| compare_labels(a.as_ref(), b.as_ref()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_labels() {
        let key = TermKey::parse("Fall 2024-2025").unwrap();
        assert_eq!(key.season, Season::Fall);
        assert_eq!(key.year_start, 2024);
        assert_eq!(key.academic_year(), "2024-2025");

        let key: TermKey = "  winter   2023-2024 ".parse().unwrap();
        assert_eq!(key, TermKey::new(Season::Winter, 2023));
    }

    #[test]
    fn parse_rejects_malformed() {
        assert_eq!(TermKey::parse(""), Err(TermParseError::Empty));
        assert!(matches!(
            TermKey::parse("Summer 2024-2025"),
            Err(TermParseError::UnknownSeason(_))
        ));
        assert!(matches!(
            TermKey::parse("Fall 2024"),
            Err(TermParseError::Malformed(_))
        ));
        assert!(matches!(
            TermKey::parse("Fall 24-25"),
            Err(TermParseError::Malformed(_))
        ));
        assert_eq!(
            TermKey::parse("Fall 2024-2026"),
            Err(TermParseError::NonConsecutiveYears {
                start: 2024,
                end: 2026
            })
        );
        assert!(TermKey::parse("Fall 2024-2025 extra").is_err());
    }

    #[test]
    fn display_round_trips() {
        let key = TermKey::new(Season::Spring, 2025);
        assert_eq!(key.to_string(), "Spring 2025-2026");
        assert_eq!(TermKey::parse(&key.to_string()).unwrap(), key);
    }

    #[test]
    fn orders_chronologically_regardless_of_input_order() {
        let mut labels = vec!["Fall 2025-2026", "Spring 2024-2025", "Fall 2024-2025"];
        sort_labels(&mut labels);
        assert_eq!(
            labels,
            vec!["Fall 2024-2025", "Spring 2024-2025", "Fall 2025-2026"]
        );
    }

    #[test]
    fn winter_sits_between_fall_and_spring() {
        let fall = TermKey::parse("Fall 2024-2025").unwrap();
        let winter = TermKey::parse("Winter 2024-2025").unwrap();
        let spring = TermKey::parse("Spring 2024-2025").unwrap();
        assert!(fall < winter && winter < spring);
        assert!(spring < fall.next_year());
    }

    #[test]
    fn unparseable_labels_sort_last() {
        let mut labels = vec!["garbage", "Spring 2024-2025", "Fall 2024-2025"];
        sort_labels(&mut labels);
        assert_eq!(labels, vec!["Fall 2024-2025", "Spring 2024-2025", "garbage"]);
    }

    #[test]
    fn serde_uses_label() {
        let key = TermKey::new(Season::Fall, 2024);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"Fall 2024-2025\"");
        let back: TermKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
