/// Linode API envelope models
use serde::{Deserialize, Serialize};

/// Error response from API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub errors: Vec<ApiError>,
}

/// API error details
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub reason: String,
    #[serde(default)]
    pub field: Option<String>,
}

impl ApiError {
    /// `field: reason`, or just the reason when no field is named
    pub fn describe(&self) -> String {
        match &self.field {
            Some(field) => format!("{}: {}", field, self.reason),
            None => self.reason.clone(),
        }
    }
}

/// One page of a collection listing
#[derive(Debug, Serialize, Deserialize)]
pub struct Page {
    pub data: Vec<serde_json::Value>,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "first_page")]
    pub pages: u32,
    #[serde(default)]
    pub results: u32,
}

fn first_page() -> u32 {
    1
}
