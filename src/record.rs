use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::category::Category;
use crate::error::ValidationError;
use crate::response::Reply;

pub const REQUIRED_KEYS: [&str; 5] = [
    "team_name",
    "featured_player",
    "player_list",
    "detailed_stats_category",
    "selected_player_detailed_stats",
];

/// Everything read off one results-screen screenshot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractionRecord {
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub featured_player: FeaturedPlayer,
    #[serde(default, deserialize_with = "null_as_default")]
    pub player_list: Vec<PlayerEntry>,
    pub detailed_stats_category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub selected_player_detailed_stats: PlayerDetailedStats,
    #[serde(default)]
    pub selected_team_detailed_stats: Option<TeamDetailedStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeaturedPlayer {
    pub name: Option<String>,
    pub overall_rating: Option<StatValue>,
    pub match_rating: Option<StatValue>,
}

/// One row of the left-hand player table. Columns the model left out stay
/// `None` and are written as `0`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerEntry {
    pub position: Option<StatValue>,
    pub name: Option<StatValue>,
    pub match_rating: Option<StatValue>,
    pub goals: Option<StatValue>,
    pub assists: Option<StatValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerDetailedStats {
    pub player_name: Option<String>,
    pub stats: StatList,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TeamDetailedStats {
    pub stats: StatList,
}

/// A single stat value. Numbers come through as-is; anything else the model
/// emits ("-", "75%") is kept as text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Int(v) => write!(f, "{v}"),
            StatValue::Float(v) => write!(f, "{v}"),
            StatValue::Bool(v) => write!(f, "{v}"),
            StatValue::Text(s) => f.write_str(s),
        }
    }
}

/// Stat name → value in panel order. Names are unique; if the model repeats a
/// key the first value is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatList(Vec<(String, StatValue)>);

impl StatList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends unless the name is already present.
    pub fn insert(&mut self, name: impl Into<String>, value: StatValue) -> bool {
        let name = name.into();
        if self.get(&name).is_some() {
            return false;
        }
        self.0.push((name, value));
        true
    }

    pub fn get(&self, name: &str) -> Option<&StatValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StatValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl<S: Into<String>> FromIterator<(S, StatValue)> for StatList {
    fn from_iter<I: IntoIterator<Item = (S, StatValue)>>(iter: I) -> Self {
        let mut list = StatList::new();
        for (name, value) in iter {
            list.insert(name, value);
        }
        list
    }
}

impl<'de> Deserialize<'de> for StatList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StatListVisitor;

        impl<'de> Visitor<'de> for StatListVisitor {
            type Value = StatList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of stat names to values")
            }

            fn visit_unit<E>(self) -> Result<StatList, E>
            where
                E: de::Error,
            {
                Ok(StatList::new())
            }

            fn visit_none<E>(self) -> Result<StatList, E>
            where
                E: de::Error,
            {
                Ok(StatList::new())
            }

            fn visit_map<A>(self, mut map: A) -> Result<StatList, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut list = StatList::new();
                while let Some((name, value)) = map.next_entry::<String, Option<StatValue>>()? {
                    let value = value.unwrap_or(StatValue::Text(String::new()));
                    list.insert(name, value);
                }
                Ok(list)
            }
        }

        deserializer.deserialize_any(StatListVisitor)
    }
}

fn check_required_keys(value: &Value) -> Result<(), ValidationError> {
    let Some(obj) = value.as_object() else {
        return Err(ValidationError::NotAnObject);
    };
    let missing: Vec<&'static str> = REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|key| !obj.contains_key(*key))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingKeys(missing))
    }
}

fn malformed(err: serde_json::Error) -> ValidationError {
    ValidationError::Malformed(err.to_string())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ExtractionRecord {
    /// Checks the required top-level keys, then reads the record. Nested
    /// fields are lenient; only the top-level shape is enforced.
    ///
    /// A `Value` has already collapsed repeated stat names to their last
    /// value; use [`ExtractionRecord::from_reply`] for model replies.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        check_required_keys(value)?;
        let record = Self::deserialize(value).map_err(malformed)?;
        record.checked()
    }

    /// Reads a parsed model reply. The record is deserialized from the reply
    /// text, so a stat name repeated in the reply keeps its first value.
    pub fn from_reply(reply: &Reply<'_>) -> Result<Self, ValidationError> {
        check_required_keys(&reply.value)?;
        let record: Self = serde_json::from_str(reply.json).map_err(malformed)?;
        record.checked()
    }

    fn checked(self) -> Result<Self, ValidationError> {
        let label = self.detailed_stats_category.trim();
        if label.is_empty() {
            return Err(ValidationError::EmptyCategory);
        }
        if label.contains(['/', '\\']) || label == "." || label == ".." {
            return Err(ValidationError::Malformed(format!(
                "category {label:?} is not usable in a file name"
            )));
        }
        Ok(self)
    }

    pub fn category(&self) -> Category {
        Category::from_label(&self.detailed_stats_category)
    }

    pub fn team_stats(&self) -> Option<&StatList> {
        self.selected_team_detailed_stats.as_ref().map(|t| &t.stats)
    }
}
