// ABOUTME: Type definitions for API requests, responses, and internal data structures
// ABOUTME: Wrong PIN and busy are tagged statuses here, never transport-level errors

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::Preferences;
use crate::entities::evidence;
use crate::vault::IncidentKind;

#[derive(Debug, Serialize, Deserialize)]
pub struct PinRequest {
    pub pin: String,
    pub platform_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PinResponse {
    /// "ok", "wrong_pin", or "busy". Wrong PIN carries no further detail.
    pub status: String,
    pub account_id: Option<String>,
    pub display_name: Option<String>,
    pub preferences: Option<Preferences>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CaptureRequest {
    /// Raw file bytes; absent or empty means a log-only entry.
    #[serde(default)]
    pub data: Option<Vec<u8>>,
    #[serde(default)]
    pub mime: Option<String>,
    pub incident_kind: IncidentKind,
    #[serde(default)]
    pub description: String,
    pub threat_level: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CaptureResponse {
    pub success: bool,
    pub record_id: Option<Uuid>,
    pub storage_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EvidenceSummary {
    pub id: Uuid,
    pub storage_key: String,
    pub incident_kind: String,
    pub description: String,
    pub threat_level: i32,
    pub archived: bool,
    pub captured_at: i64,
}

impl From<evidence::Model> for EvidenceSummary {
    fn from(model: evidence::Model) -> Self {
        Self {
            id: model.id,
            storage_key: model.storage_key,
            incident_kind: model.incident_kind,
            description: model.description,
            threat_level: model.threat_level,
            archived: model.archived,
            captured_at: model.captured_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListEvidenceResponse {
    pub records: Vec<EvidenceSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EvidenceUpdateRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub threat_level: Option<i32>,
    #[serde(default)]
    pub incident_kind: Option<IncidentKind>,
    #[serde(default)]
    pub archived: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MediaUrlRequest {
    pub storage_key: String,
    #[serde(default)]
    pub thumbnail: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MediaUrlResponse {
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurgeRequest {
    pub storage_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimpleResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatePreferencesRequest {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub calendar: Option<String>,
}
