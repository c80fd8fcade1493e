//! Error types for ForgeLoop
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// ForgeLoop 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 실행 루프 관련
    // ========================================================================
    #[error("Hook '{hook}' aborted: {message}")]
    Hook { hook: String, message: String },

    #[error("Step failed: {0}")]
    Step(String),

    #[error("Compaction failed: {0}")]
    Compaction(String),

    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // 외부 호출 관련
    // ========================================================================
    #[error("Model call failed: {model} - {message}")]
    Model { model: String, message: String },

    #[error("Tool call failed: {tool} - {message}")]
    Tool { tool: String, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 취소로 인한 에러인지 확인
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// 외부 호출 실패인지 확인 (모델/도구)
    pub fn is_call_failure(&self) -> bool {
        matches!(self, Error::Model { .. } | Error::Tool { .. })
    }

    /// Hook 에러 생성 헬퍼
    pub fn hook(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Hook {
            hook: hook.into(),
            message: message.into(),
        }
    }

    /// 모델 호출 에러 생성 헬퍼
    pub fn model(model: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Model {
            model: model.into(),
            message: message.into(),
        }
    }

    /// 도구 호출 에러 생성 헬퍼
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_helpers() {
        let err = Error::hook("audit", "denied");
        assert_eq!(err.to_string(), "Hook 'audit' aborted: denied");

        let err = Error::model("small", "overloaded");
        assert!(err.is_call_failure());
        assert!(!err.is_cancelled());

        assert!(Error::Cancelled.is_cancelled());
    }

    #[test]
    fn test_error_from_string() {
        let err: Error = "boom".into();
        assert!(matches!(err, Error::Internal(ref m) if m == "boom"));
    }
}
