//! Shared server types: the REST envelope and application state

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use brokerscope_engine::PostureService;

/// Application state shared across handlers
pub struct AppState {
    pub service: Arc<PostureService>,
}

/// REST API result type with convenient builder methods
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestResult<T> {
    pub code: i32,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T> RestResult<T> {
    /// Create a successful result with data
    pub fn ok(data: Option<T>) -> Self {
        RestResult {
            code: 0,
            message: Some("success".to_string()),
            data,
        }
    }

    /// Create an error result
    pub fn err(code: i32, message: &str) -> Self {
        RestResult {
            code,
            message: Some(message.to_string()),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_result_ok() {
        let result = RestResult::ok(Some(42));
        assert_eq!(result.code, 0);
        assert_eq!(result.message.as_deref(), Some("success"));
        assert_eq!(result.data, Some(42));

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"code\":0"));
    }

    #[test]
    fn test_rest_result_err() {
        let result = RestResult::<()>::err(404, "broker not found");
        assert_eq!(result.code, 404);
        assert_eq!(result.message.as_deref(), Some("broker not found"));
        assert!(result.data.is_none());
    }
}
