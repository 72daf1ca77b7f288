use crate::error::AppError;
use brick_api::SetPayload;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// A set in the user's collection, mirrored from the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetRecord {
    pub set_num: String,
    pub name: String,
    pub year: i32,
    pub num_parts: u32,
    pub image_url: Option<String>,
    pub theme_id: Option<i64>,
    pub theme_name: Option<String>,
    pub is_ongoing: bool,
    pub is_hidden: bool,
    /// Logical clock (epoch ms, monotonic per client)
    pub added_at: i64,
    pub last_opened_at: i64,
}

impl SetRecord {
    /// Creates a record without theme or image; timestamps are assigned on insert
    pub fn new(set_num: &str, name: &str, year: i32, num_parts: u32) -> Self {
        Self {
            set_num: set_num.to_string(),
            name: name.to_string(),
            year,
            num_parts,
            image_url: None,
            theme_id: None,
            theme_name: None,
            is_ongoing: false,
            is_hidden: false,
            added_at: 0,
            last_opened_at: 0,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.set_num.trim().is_empty() {
            return Err(AppError::Validation(
                "Set number must not be empty".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Set name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Builds a local record from the server representation
    pub fn from_payload(payload: SetPayload, added_at: i64) -> Self {
        Self {
            set_num: payload.set_num,
            name: payload.name,
            year: payload.year,
            num_parts: payload.num_parts,
            image_url: payload.image_url,
            theme_id: payload.theme_id,
            theme_name: payload.theme_name,
            is_ongoing: payload.is_ongoing,
            is_hidden: payload.is_hidden,
            added_at,
            last_opened_at: added_at,
        }
    }

    pub fn to_payload(&self) -> SetPayload {
        SetPayload {
            set_num: self.set_num.clone(),
            name: self.name.clone(),
            year: self.year,
            num_parts: self.num_parts,
            image_url: self.image_url.clone(),
            theme_id: self.theme_id,
            theme_name: self.theme_name.clone(),
            is_ongoing: self.is_ongoing,
            is_hidden: self.is_hidden,
            added_at: Some(serde_json::Value::from(self.added_at)),
        }
    }
}

impl<'r> TryFrom<&Row<'r>> for SetRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'r>) -> Result<Self, Self::Error> {
        Ok(SetRecord {
            set_num: row.get("set_num")?,
            name: row.get("name")?,
            year: row.get("year")?,
            num_parts: row.get("num_parts")?,
            image_url: row.get("image_url")?,
            theme_id: row.get("theme_id")?,
            theme_name: row.get("theme_name")?,
            is_ongoing: row.get("is_ongoing")?,
            is_hidden: row.get("is_hidden")?,
            added_at: row.get("added_at")?,
            last_opened_at: row.get("last_opened_at")?,
        })
    }
}
