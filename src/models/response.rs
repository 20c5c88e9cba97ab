use serde::{Deserialize, Serialize};

/// Envelope of the local dashboard API.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            message: None,
        }
    }

    pub fn message(message: String) -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            message: Some(message),
        }
    }
}

/// Single-item envelope returned by the cluster REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteResponse<T> {
    #[serde(default)]
    pub error_code: i64,
    #[serde(default)]
    pub message: String,
    pub data: T,
}

/// Collection envelope returned by the cluster REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteListResponse<T> {
    #[serde(default)]
    pub error_code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> RemoteListResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self {
            error_code: 0,
            message: String::new(),
            count: data.len() as u64,
            page: 1,
            size: data.len() as u64,
            data,
        }
    }
}
