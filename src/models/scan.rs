//! Barcode/RFID scan events captured at a circulation station

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScanEvent {
    pub station: String,
    pub isbn: Option<String>,
    pub rfid: Option<String>,
    pub scanned_at: DateTime<Utc>,
}
