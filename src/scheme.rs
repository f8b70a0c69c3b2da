#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Registration {
    pub id: i64,
    #[sqlx(rename = "device_key")]
    pub key: String,
    #[sqlx(rename = "device_token")]
    pub token: String,
}

/// JSON envelope shared by every API response.
#[derive(Debug, serde::Serialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub timestamp: i64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 200,
            message: "success",
            data: Some(data),
            timestamp: unix_timestamp(),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(code: u16, message: &'static str) -> Self {
        Self {
            code,
            message,
            data: None,
            timestamp: unix_timestamp(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RegisterData<'a> {
    pub key: &'a str,
    pub device_key: &'a str,
    pub device_token: &'a str,
}

#[derive(Debug, serde::Serialize)]
pub struct ServerInfo {
    pub version: &'static str,
    pub build: &'static str,
    pub arch: &'static str,
    pub commit: &'static str,
    pub devices: u64,
}

pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
