//! Normalized lending record structs.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

/// Fiction tag carried by each title. The source sheet leaves the tag blank
/// for some titles, so this is tri-state.
///
/// Deserialization goes through [`FictionFlag::parse`], so raw tags
/// (`Yes`/`No`), category labels (`Non-Fiction`) and the serialized
/// snake_case names are all accepted.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FictionFlag {
    Fiction,
    NonFiction,
    Unknown,
}

impl FictionFlag {
    /// Category label used as the `category` dimension key.
    pub fn label(&self) -> &'static str {
        match self {
            FictionFlag::Fiction => "Fiction",
            FictionFlag::NonFiction => "Non-Fiction",
            FictionFlag::Unknown => "Unknown",
        }
    }

    /// Parse a raw tag or category label. Blank input is `Unknown`;
    /// unrecognized text is `None` so the loader can reject the row.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
            return Some(FictionFlag::Unknown);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "fiction" => Some(FictionFlag::Fiction),
            "no" | "n" | "false" | "non-fiction" | "nonfiction" | "non_fiction" => {
                Some(FictionFlag::NonFiction)
            }
            "unknown" => Some(FictionFlag::Unknown),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for FictionFlag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        FictionFlag::parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("unrecognized fiction tag `{raw}`"))
        })
    }
}

impl std::fmt::Display for FictionFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One circulation entry from the top-titles dataset.
///
/// `publication_year` is not stored: it is always derived from
/// `publication_date`, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Catalogue title id. Not unique across transaction years.
    pub title: String,
    /// Display title.
    pub native_name: String,
    pub author: String,
    pub publisher: String,
    pub subject: String,
    /// Title-cased media type (`Ebook`, `Audiobook`, ...).
    pub media_type: String,
    pub publication_date: Option<NaiveDate>,
    pub transaction_year: i32,
    /// Popularity ordinal, `>= 1`. Lower is better.
    pub rank: u32,
    pub fiction: FictionFlag,
}

impl Record {
    pub fn publication_year(&self) -> Option<i32> {
        self.publication_date.map(|d| d.year())
    }
}

/// Title-case a media label the way the dashboard displays it: the first
/// letter of every alphabetic run is upper-cased, the rest lower-cased.
pub fn normalize_media(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_alpha = false;
    for ch in raw.trim().chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}
