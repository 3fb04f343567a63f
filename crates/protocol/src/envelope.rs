//! The `{code, msg}` result envelope embedded in every response.

use serde::{Deserialize, Serialize};

use crate::constants::SUCCESS_CODE;

/// Outcome carried by every endpoint response.
///
/// `code == 800` is the only success value; anything else is a domain
/// error whose `msg` comes from the server verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub code: i32,
    #[serde(default)]
    pub msg: String,
}

/// A non-success result envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("StealthIM error {code}: {msg}")]
pub struct DomainError {
    pub code: i32,
    pub msg: String,
}

impl ResultEnvelope {
    /// Creates a success envelope.
    pub fn success() -> Self {
        Self {
            code: SUCCESS_CODE,
            msg: String::new(),
        }
    }

    /// Creates an error envelope.
    pub fn failure(code: i32, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
        }
    }

    /// Returns `true` if the code is the success code.
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Converts the envelope into `Ok(())` or the matching [`DomainError`].
    pub fn into_result(self) -> Result<(), DomainError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(DomainError {
                code: self.code,
                msg: self.msg,
            })
        }
    }

    /// Borrowing variant of [`into_result`](Self::into_result).
    pub fn check(&self) -> Result<(), DomainError> {
        self.clone().into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_code_is_800() {
        assert!(ResultEnvelope::success().is_success());
        assert!(ResultEnvelope::failure(800, "").is_success());
        assert!(!ResultEnvelope::failure(801, "").is_success());
        assert!(!ResultEnvelope::failure(0, "").is_success());
    }

    #[test]
    fn failure_carries_server_message() {
        let err = ResultEnvelope::failure(1401, "file not found")
            .into_result()
            .unwrap_err();
        assert_eq!(err.code, 1401);
        assert_eq!(err.msg, "file not found");
        assert_eq!(err.to_string(), "StealthIM error 1401: file not found");
    }

    #[test]
    fn parses_wire_shape() {
        let env: ResultEnvelope = serde_json::from_str(r#"{"code":800,"msg":""}"#).unwrap();
        assert!(env.check().is_ok());

        // Servers sometimes omit the message on success.
        let env: ResultEnvelope = serde_json::from_str(r#"{"code":800}"#).unwrap();
        assert_eq!(env.msg, "");
    }
}
