use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Known outcomes, each with a fixed success flag, numeric code and message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success,
    UnknownReason,
    NoPermission,
    Unauthorized,
    BadRequest,
    UploadFailed,
    NotFound,
}

impl ResultCode {
    pub fn success(self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Success => 20000,
            Self::UnknownReason => 20001,
            Self::NoPermission => 20002,
            Self::Unauthorized => 20003,
            Self::BadRequest => 40000,
            Self::UploadFailed => 70000,
            Self::NotFound => 90000,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::UnknownReason => "unknown error",
            Self::NoPermission => "no permission",
            Self::Unauthorized => "not logged in",
            Self::BadRequest => "invalid request",
            Self::UploadFailed => "file upload failed",
            Self::NotFound => "channel not found",
        }
    }
}

/// The uniform `{ success, code, message, data }` response body.
///
/// Builder methods take `self` by value, so an envelope is assembled once
/// and never mutated after it leaves the handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Envelope {
    pub fn ok() -> Self {
        Self::with_code(ResultCode::Success)
    }

    pub fn error() -> Self {
        Self::with_code(ResultCode::UnknownReason)
    }

    pub fn with_code(code: ResultCode) -> Self {
        Self {
            success: code.success(),
            code: code.code(),
            message: code.message().to_string(),
            data: Map::new(),
        }
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    /// Set a single data key. A value that cannot be represented as JSON
    /// (e.g. a map with non-string keys) is stored as `null`.
    pub fn data<T: Serialize>(mut self, key: impl Into<String>, value: T) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.data.insert(key.into(), value);
        self
    }

    /// Replace the whole data mapping.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }
}
