//! Response envelopes
//!
//! Every body the agent sends carries a `success` flag; the HTTP status code
//! says the same thing for clients that look at it.

use koth_core::CommandResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Current owner of the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusData {
    #[schema(example = "team-blue")]
    pub identifier: String,
}

/// Body of `/status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub success: bool,
    pub data: StatusData,
}

impl StatusResponse {
    pub fn owner(identifier: impl Into<String>) -> Self {
        Self {
            success: true,
            data: StatusData {
                identifier: identifier.into(),
            },
        }
    }

    /// The owner could not be determined; the identifier is left empty.
    pub fn failed() -> Self {
        Self {
            success: false,
            data: StatusData {
                identifier: String::new(),
            },
        }
    }
}

/// Output of the health-check command, unmodified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthData {
    #[schema(example = "")]
    pub stdout: String,
    #[schema(example = "")]
    pub stderr: String,
    /// Exit code of the command
    #[schema(example = 0)]
    pub status: i32,
}

/// Body of `/healthcheck`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub success: bool,
    pub data: HealthData,
}

impl From<CommandResult> for HealthResponse {
    fn from(result: CommandResult) -> Self {
        Self {
            success: result.succeeded(),
            data: HealthData {
                stdout: result.stdout,
                stderr: result.stderr,
                status: result.exit_code,
            },
        }
    }
}

/// Body of a rejected or failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    #[schema(example = "Unauthorized")]
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_wire_format() {
        let body = serde_json::to_value(StatusResponse::owner("owner1\n")).unwrap();
        assert_eq!(
            body,
            json!({"success": true, "data": {"identifier": "owner1\n"}})
        );

        let body = serde_json::to_value(StatusResponse::failed()).unwrap();
        assert_eq!(body, json!({"success": false, "data": {"identifier": ""}}));
    }

    #[test]
    fn test_health_from_command_result() {
        let response = HealthResponse::from(CommandResult {
            stdout: "up\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
        });
        assert!(response.success);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": true, "data": {"stdout": "up\n", "stderr": "", "status": 0}})
        );

        let response = HealthResponse::from(CommandResult {
            stdout: String::new(),
            stderr: "disk full\n".to_string(),
            exit_code: 0,
        });
        assert!(!response.success);
        assert_eq!(response.data.stderr, "disk full\n");
    }
}
