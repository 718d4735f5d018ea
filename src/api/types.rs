use serde::Serialize;

/// Envelope every endpoint answers with: `{ok, data?, warning?, errorKind?,
/// message?}`. A degraded success (primary write durable, mirror not fully
/// synchronized) is an ok response carrying a warning.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            warning: None,
            error_kind: None,
            message: None,
        }
    }

    pub const fn with_warning(data: T, warning: Option<String>) -> Self {
        Self {
            ok: true,
            data: Some(data),
            warning,
            error_kind: None,
            message: None,
        }
    }

    pub fn failure(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            warning: None,
            error_kind: Some(kind),
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedDto {
    pub deleted: String,
}
