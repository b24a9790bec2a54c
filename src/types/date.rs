// src/types/date.rs

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CairnError;

/// A Cairn `Date` value, carried on the wire as
/// `{"__type": "Date", "iso": "..."}`. The server always emits UTC with
/// millisecond precision.
///
/// Deserialization also accepts a bare ISO string, the form the server
/// uses for the top-level `createdAt` and `updatedAt` fields.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct CairnDate {
    #[serde(rename = "__type")]
    type_field: String, // Should always be "Date"
    pub iso: String,
}

impl<'de> Deserialize<'de> for CairnDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Envelope {
                #[serde(rename = "__type")]
                type_field: String,
                iso: String,
            },
            Plain(String),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Envelope { type_field, iso } => {
                if type_field != "Date" {
                    return Err(serde::de::Error::custom(format!(
                        "expected __type \"Date\", found \"{}\"",
                        type_field
                    )));
                }
                Ok(CairnDate::new(iso))
            }
            Wire::Plain(iso) => Ok(CairnDate::new(iso)),
        }
    }
}

impl CairnDate {
    /// Creates a `CairnDate` from an ISO 8601 string. The string is not
    /// validated; use [`CairnDate::from_datetime`] for a guaranteed-valid
    /// value.
    pub fn new(iso_string: impl Into<String>) -> Self {
        CairnDate {
            type_field: "Date".to_string(),
            iso: iso_string.into(),
        }
    }

    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        CairnDate::new(datetime.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// The current instant, millisecond precision.
    pub fn now() -> Self {
        CairnDate::from_datetime(Utc::now())
    }

    /// Parses the stored string back into a `chrono` datetime.
    pub fn to_datetime(&self) -> Result<DateTime<Utc>, CairnError> {
        DateTime::parse_from_rfc3339(&self.iso)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                CairnError::InvalidInput(format!("invalid ISO 8601 date '{}': {}", self.iso, e))
            })
    }

    pub fn iso(&self) -> &str {
        &self.iso
    }
}
