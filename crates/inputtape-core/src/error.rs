//! Structured errors shared by the recorder, the player and the CLI

use serde::{Deserialize, Serialize};
use std::path::Path;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("[{code:?}] {message}")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    /// Platform error code (`GetLastError` on Windows)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_code: Option<i32>,
    /// 1-based line number in the event log
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MalformedRecord,
    UnsupportedKey,
    UnknownKey,
    HookInstall,
    Injection,
    Storage,
    ScreenGeometry,
    Config,
    NotSupported,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            os_code: None,
            line: None,
        }
    }

    pub fn with_os_code(mut self, os_code: i32) -> Self {
        self.os_code = Some(os_code);
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::MalformedRecord, reason)
    }

    pub fn unknown_key(name: &str) -> Self {
        Self::new(ErrorCode::UnknownKey, format!("Unknown key name: {}", name))
    }

    pub fn hook_install(hook: &str, os_code: i32) -> Self {
        Self::new(
            ErrorCode::HookInstall,
            format!("Failed to install {} hook (errno={})", hook, os_code),
        )
        .with_os_code(os_code)
    }

    pub fn injection(sent: usize, requested: usize, os_code: i32) -> Self {
        Self::new(
            ErrorCode::Injection,
            format!(
                "SendInput injected {} of {} inputs (errno={})",
                sent, requested, os_code
            ),
        )
        .with_os_code(os_code)
    }

    pub fn storage(path: &Path, err: std::io::Error) -> Self {
        let err_code = err.raw_os_error();
        let e = Self::new(
            ErrorCode::Storage,
            format!("{}: {}", path.display(), err),
        );
        match err_code {
            Some(c) => e.with_os_code(c),
            None => e,
        }
    }

    pub fn not_supported(what: &str) -> Self {
        Self::new(
            ErrorCode::NotSupported,
            format!("{} is only supported on Windows", what),
        )
    }

    pub fn is_malformed(&self) -> bool {
        self.code == ErrorCode::MalformedRecord
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        let os = e.raw_os_error();
        let err = Self::new(ErrorCode::Storage, e.to_string());
        match os {
            Some(c) => err.with_os_code(c),
            None => err,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::malformed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let e = Error::injection(1, 3, 5);
        assert_eq!(e.to_string(), "[Injection] SendInput injected 1 of 3 inputs (errno=5)");
        assert_eq!(e.os_code, Some(5));
    }

    #[test]
    fn serializes_screaming_code() {
        let e = Error::malformed("bad line").at_line(4);
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["code"], "MALFORMED_RECORD");
        assert_eq!(v["line"], 4);
        assert!(v.get("os_code").is_none());
    }
}
