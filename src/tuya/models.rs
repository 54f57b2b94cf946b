use serde::{Deserialize, Serialize};

use super::TuyaError;

// ---------------------------------------------------------------------------
// Generic response envelope
//
// Every Tuya Cloud API wraps its payload in the same outer object:
//
// Success:
//   { "success": true, "t": 1545447665981, "result": <T>, "tid": "..." }
//
// Failure:
//   { "success": false, "t": 1561348644346, "code": 2009, "msg": "...", "tid": "..." }
//
// `result` is absent on failure; `code` and `msg` are absent on success.
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TuyaResponse<T> {
    /// `true` on success, `false` on API-level failure.
    pub success: bool,

    /// 13-digit Unix timestamp in milliseconds returned by the server.
    pub t: i64,

    /// Server-side request trace ID — useful for support queries.
    pub tid: Option<String>,

    /// Present on success.
    pub result: Option<T>,

    /// Tuya error code — present on failure.
    pub code: Option<i32>,

    /// Human-readable error message — present on failure.
    pub msg: Option<String>,
}

impl<T> TuyaResponse<T> {
    /// Unwrap the envelope, mapping API-level failures to `TuyaError::Device`.
    pub fn into_result(self) -> Result<T, TuyaError> {
        if self.success {
            self.result.ok_or(TuyaError::MissingResult)
        } else {
            Err(TuyaError::Device {
                code: self.code.unwrap_or(-1),
                msg: self
                    .msg
                    .unwrap_or_else(|| "(no message)".to_owned()),
            })
        }
    }
}

pub type TokenResponse = TuyaResponse<TokenResult>;
pub type DeviceStatusResponse = TuyaResponse<Vec<DeviceProperty>>;
pub type SendCommandResponse = TuyaResponse<bool>;

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TokenResult {
    pub access_token: String,
    /// Remaining lifetime in seconds.
    pub expire_time: i64,
    pub refresh_token: String,
    pub uid: String,
}

// ---------------------------------------------------------------------------
// DpValue — typed replacement for serde_json::Value in device properties
//
// Tuya DP values are polymorphic: a single status response can contain
// booleans, integers, floats, and strings. #[serde(untagged)] makes serde
// try each variant in order; Bool MUST come before the numeric variants so
// JSON true/false is not coerced to 1/0.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DpValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl DpValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DpValue::Integer(v) => Some(*v as f64),
            DpValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DpValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Device status
// ---------------------------------------------------------------------------

/// One data-point (DP) reported by the device, e.g. `cur_power = 1234`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceProperty {
    pub code: String,
    pub value: DpValue,
}

// ---------------------------------------------------------------------------
// Send command
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SendCommandRequest {
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Command {
    pub code: String,
    pub value: serde_json::Value,
}
