//! OneLogin API v1 payloads.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Every v1 response: `{"status": {...}, "data": [...]}`.
#[derive(Clone, Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status: Option<ApiStatus>,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub code: u16,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of `login/auth` and `login/verify_factor`.
#[derive(Clone, Debug, Deserialize)]
pub struct LoginData {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub user: Option<LoginUser>,
    #[serde(default)]
    pub state_token: Option<String>,
    #[serde(default)]
    pub devices: Vec<Device>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginUser {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl LoginUser {
    /// Login name, falling back to the email address.
    #[must_use]
    pub fn login(&self) -> Option<&str> {
        self.username
            .as_deref()
            .filter(|name| !name.is_empty())
            .or(self.email.as_deref())
            .filter(|name| !name.is_empty())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Device {
    #[serde(default, deserialize_with = "id_string")]
    pub device_id: String,
    #[serde(default)]
    pub device_type: String,
}

impl Device {
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.device_id.trim().is_empty() && !self.device_type.trim().is_empty()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub member_of: Option<String>,
}

/// OneLogin ids are numbers in most payloads and strings in a few.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!("invalid id: {other}"))),
    }
}
