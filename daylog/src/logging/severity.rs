//! 로그 심각도와 로깅 레벨
//!
//! `LogSeverity`는 항목 하나의 심각도이고, `LoggingLevel`은 코디네이터의
//! 필터 상태(비활성 또는 최소 심각도)입니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LogError;

/// 로그 심각도 (전순서)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogSeverity {
    /// 디버깅 정보
    Debug = 0,
    /// 일반 정보
    Info = 1,
    /// 경고 상황
    Warn = 2,
    /// 오류 상황
    Error = 3,
    /// 시스템 중단 수준 오류
    Fatal = 4,
    /// 검사 통과
    Pass = 5,
    /// 검사 실패
    Fail = 6,
    /// 분류되지 않은 출력
    Other = 7,
}

impl LogSeverity {
    pub const ALL: [LogSeverity; 8] = [
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
        LogSeverity::Fatal,
        LogSeverity::Pass,
        LogSeverity::Fail,
        LogSeverity::Other,
    ];

    /// 심각도를 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO",
            LogSeverity::Warn => "WARN",
            LogSeverity::Error => "ERROR",
            LogSeverity::Fatal => "FATAL",
            LogSeverity::Pass => "PASS",
            LogSeverity::Fail => "FAIL",
            LogSeverity::Other => "OTHER",
        }
    }
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogSeverity {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" => Ok(LogSeverity::Debug),
            "INFO" => Ok(LogSeverity::Info),
            "WARN" | "WARNING" => Ok(LogSeverity::Warn),
            "ERROR" => Ok(LogSeverity::Error),
            "FATAL" => Ok(LogSeverity::Fatal),
            "PASS" => Ok(LogSeverity::Pass),
            "FAIL" => Ok(LogSeverity::Fail),
            "OTHER" => Ok(LogSeverity::Other),
            other => Err(LogError::Config(format!("알 수 없는 로그 심각도: {}", other))),
        }
    }
}

/// 코디네이터의 로깅 레벨
///
/// `Disabled`는 어떤 심각도보다도 높은 필터로 동작합니다. 활성 여부는
/// 항상 이 값에서 파생되므로 별도의 플래그와 어긋날 수 없습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoggingLevel {
    Disabled,
    Enabled(LogSeverity),
}

impl LoggingLevel {
    /// 로깅이 켜져 있는지 여부
    pub fn is_enabled(&self) -> bool {
        matches!(self, LoggingLevel::Enabled(_))
    }

    /// 주어진 심각도의 항목이 이 레벨에서 기록되는지 여부
    pub fn permits(&self, severity: LogSeverity) -> bool {
        match self {
            LoggingLevel::Disabled => false,
            LoggingLevel::Enabled(min) => severity >= *min,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoggingLevel::Disabled => "DISABLED",
            LoggingLevel::Enabled(severity) => severity.as_str(),
        }
    }
}

impl Default for LoggingLevel {
    fn default() -> Self {
        LoggingLevel::Enabled(LogSeverity::Info)
    }
}

impl From<LogSeverity> for LoggingLevel {
    fn from(severity: LogSeverity) -> Self {
        LoggingLevel::Enabled(severity)
    }
}

impl fmt::Display for LoggingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoggingLevel {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DISABLED" | "OFF" | "NONE" => Ok(LoggingLevel::Disabled),
            other => other.parse().map(LoggingLevel::Enabled),
        }
    }
}
