use serde::{Deserialize, Serialize};

/// Connection settings for the tracker backend
#[derive(Debug, Clone, PartialEq)]
pub struct BrickApiConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    /// Sent as `X-Client-Id` so the server can attribute writes to a device
    pub client_id: String,
    pub timeout_secs: u64,
}

impl Default for BrickApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            auth_token: None,
            client_id: String::new(),
            timeout_secs: 30,
        }
    }
}

/// A set as stored server-side for the current user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetPayload {
    pub set_num: String,
    pub name: String,
    pub year: i32,
    pub num_parts: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub theme_id: Option<i64>,
    #[serde(default)]
    pub theme_name: Option<String>,
    #[serde(default)]
    pub is_ongoing: bool,
    #[serde(default)]
    pub is_hidden: bool,
    /// Server timestamp, either epoch millis or an RFC 3339 string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<serde_json::Value>,
}

/// Partial update of the per-user set flags
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetFlagsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_ongoing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hidden: Option<bool>,
}

/// Progress row sent to the server; `updatedAt` is assigned server-side
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRow {
    pub part_num: String,
    pub color_id: i64,
    pub is_spare: bool,
    pub needed_qty: u32,
    pub found_qty: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkProgressRequest {
    pub updates: Vec<ProgressRow>,
}

/// Progress row as returned by the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProgressRow {
    pub part_num: String,
    pub color_id: i64,
    pub is_spare: bool,
    pub needed_qty: u32,
    pub found_qty: u32,
    /// Epoch millis, numeric string or RFC 3339; normalized by the caller
    #[serde(default)]
    pub updated_at: serde_json::Value,
}

/// One line of a set inventory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartLine {
    pub part_num: String,
    pub color_id: i64,
    pub part_name: String,
    pub color_name: String,
    pub quantity: u32,
    #[serde(default)]
    pub is_spare: bool,
    #[serde(default)]
    pub is_minifig: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MinifigEntry {
    pub fig_num: String,
    pub name: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryPayload {
    pub set_num: String,
    pub parts: Vec<PartLine>,
    #[serde(default)]
    pub minifigs: Option<Vec<MinifigEntry>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_patch_skips_unset_fields() {
        let patch = SetFlagsPatch {
            is_ongoing: Some(true),
            is_hidden: None,
        };
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"{"isOngoing":true}"#);
    }

    #[test]
    fn test_remote_progress_row_accepts_string_timestamp() {
        let row: RemoteProgressRow = serde_json::from_str(
            r#"{"partNum":"3001","colorId":1,"isSpare":false,"neededQty":4,"foundQty":2,"updatedAt":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(row.part_num, "3001");
        assert!(row.updated_at.is_string());
    }

    #[test]
    fn test_remote_progress_row_without_timestamp() {
        let row: RemoteProgressRow = serde_json::from_str(
            r#"{"partNum":"3001","colorId":1,"isSpare":true,"neededQty":1,"foundQty":0}"#,
        )
        .unwrap();
        assert!(row.updated_at.is_null());
    }
}
