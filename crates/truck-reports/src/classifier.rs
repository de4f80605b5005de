//! Truck identifier extraction from attachment filenames.
//!
//! Report filenames carry the truck's plate number as two digit pairs. Names
//! produced by mail clients that leave a `UTF-8` encoded-word marker in the
//! filename separate the pairs with a dot (`12.34`); every other name uses an
//! underscore (`12_34`). Both map to the four-digit truck name `1234`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Literal marker that selects the dotted heuristic.
const UTF8_MARKER: &str = "UTF-8";

static RE_DOTTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{2}\.[0-9]{2}").expect("valid dotted pattern"));
static RE_UNDERSCORED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{2}_[0-9]{2}").expect("valid underscore pattern"));

/// Why a filename could not be mapped to a truck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownReason {
    /// The attachment part carried no filename at all.
    MissingFilename,
    /// A `UTF-8` marked name without a `DD.DD` group.
    NoDottedPattern,
    /// A plain name without a `DD_DD` group.
    NoUnderscorePattern,
}

impl fmt::Display for UnknownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnknownReason::MissingFilename => "attachment has no filename",
            UnknownReason::NoDottedPattern => "no DD.DD group in UTF-8 marked name",
            UnknownReason::NoUnderscorePattern => "no DD_DD group in name",
        };
        f.write_str(text)
    }
}

/// Outcome of classifying one attachment filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Classified {
        truck_name: String,
        original_name: String,
    },
    Unknown {
        /// Random tag that keeps unrelated unknown reports from overwriting
        /// each other in the report store.
        tag: String,
        reason: UnknownReason,
    },
}

impl Classification {
    /// Key under which the resulting report is upserted.
    pub fn report_key(&self) -> String {
        match self {
            Classification::Classified { truck_name, .. } => truck_name.clone(),
            Classification::Unknown { tag, .. } => format!("no data ({})", tag),
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self, Classification::Classified { .. })
    }

    fn unknown(reason: UnknownReason) -> Self {
        let tag = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        Classification::Unknown { tag, reason }
    }
}

/// Classifies an optional attachment filename.
pub fn classify_attachment(filename: Option<&str>) -> Classification {
    match filename {
        Some(name) if !name.is_empty() => classify_filename(name),
        _ => Classification::unknown(UnknownReason::MissingFilename),
    }
}

/// Maps a raw filename to a truck identifier.
///
/// The two heuristics are mutually exclusive: a `UTF-8` marked name is only
/// ever matched against the dotted pattern, even if it also contains an
/// underscore group.
pub fn classify_filename(name: &str) -> Classification {
    if name.contains(UTF8_MARKER) {
        match RE_DOTTED.find(name) {
            Some(m) => Classification::Classified {
                truck_name: truck_name_from_group(m.as_str()),
                original_name: m.as_str().to_string(),
            },
            None => Classification::unknown(UnknownReason::NoDottedPattern),
        }
    } else {
        match RE_UNDERSCORED.find(name) {
            Some(m) => Classification::Classified {
                truck_name: truck_name_from_group(m.as_str()),
                original_name: name.to_string(),
            },
            None => Classification::unknown(UnknownReason::NoUnderscorePattern),
        }
    }
}

/// `"12.34"` / `"12_34"` -> `"1234"`. The group is always five ASCII bytes.
fn truck_name_from_group(group: &str) -> String {
    format!("{}{}", &group[0..2], &group[3..5])
}
