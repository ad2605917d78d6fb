use std::fmt;
use std::str::FromStr;

use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// FieldType
// ---------------------------------------------------------------------------

/// Storage type of a table field.
///
/// Timestamps are carried as [`FieldType::Text`] with usage
/// [`FieldUsage::Time`]; they are parsed into instants on ingress.
///
/// Serialized as its lowercase name, which is the stable wire id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Boolean,
    Float64,
    Integer64,
    Text,
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl FromStr for FieldType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "boolean" => Ok(Self::Boolean),
            "float64" => Ok(Self::Float64),
            "integer64" => Ok(Self::Integer64),
            // Declared timestamps are stored as text and flagged by usage.
            "text" | "timestamp" => Ok(Self::Text),
            other => anyhow::bail!("unknown field type: {other:?}"),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Boolean => "boolean",
            Self::Float64 => "float64",
            Self::Integer64 => "integer64",
            Self::Text => "text",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// FieldUsage
// ---------------------------------------------------------------------------

/// How a field participates in query processing.
///
/// Serialized as its lowercase name, which is the stable wire id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUsage {
    Data,
    Time,
    Group,
    Sequence,
}

impl Serialize for FieldUsage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FieldUsage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl FromStr for FieldUsage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "data" => Ok(Self::Data),
            "time" => Ok(Self::Time),
            "group" => Ok(Self::Group),
            "sequence" => Ok(Self::Sequence),
            other => anyhow::bail!("unknown field usage: {other:?}"),
        }
    }
}

impl fmt::Display for FieldUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Data => "data",
            Self::Time => "time",
            Self::Group => "group",
            Self::Sequence => "sequence",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// A single column declaration, shared between the catalog and the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub usage: FieldUsage,
    #[serde(default)]
    pub description: String,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType, usage: FieldUsage) -> Self {
        Self {
            name: name.into(),
            field_type,
            usage,
            description: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
