//! 로깅 설정 관리
//!
//! 코디네이터 초기화 시 주변 애플리케이션이 한 번 공급하는 설정입니다.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::logging::file_sink::CRASH_LOG_FILE_NAME;
use crate::logging::retry::RetryPolicy;
use crate::logging::severity::LoggingLevel;

/// 로깅 시스템 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 날짜별 로그 파일 디렉토리 (기본값: ./logs)
    pub logs_dir: PathBuf,

    /// 로그 파일 확장자, 점 제외 (기본값: log)
    pub file_extension: String,

    /// 크래시 로그 경로 (기본값: ./CRASH.log)
    pub crash_log_path: PathBuf,

    /// 시각에 밀리초 포함 여부 (기본값: true)
    pub log_milliseconds: bool,

    /// 호출자가 지정하지 않았을 때 콘솔 에코 여부 (기본값: false)
    pub default_write_out: bool,

    /// 초기 로깅 레벨 (기본값: INFO)
    pub initial_level: LoggingLevel,

    /// 버퍼링된 항목 강제 기록 간격, 0이면 버퍼링 안 함 (기본값: 5초)
    pub force_log_interval: Duration,

    /// 파일 경합 재시도 정책 (기본값: 무제한)
    pub retry: RetryPolicy,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            logs_dir: PathBuf::from("./logs"),
            file_extension: "log".to_string(),
            crash_log_path: PathBuf::from(".").join(CRASH_LOG_FILE_NAME),
            log_milliseconds: true,
            default_write_out: false,
            initial_level: LoggingLevel::default(),
            force_log_interval: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

impl LoggingConfig {
    /// 환경변수에서 설정 로드 (.env 파일이 있으면 먼저 읽음)
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let mut config = Self::default();

        if let Ok(val) = std::env::var("LOG_DIR") {
            config.logs_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("LOG_FILE_EXTENSION") {
            config.file_extension = val;
        }

        if let Ok(val) = std::env::var("LOG_CRASH_FILE") {
            config.crash_log_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("LOG_MILLISECONDS") {
            config.log_milliseconds = val.to_lowercase() == "true";
        }

        if let Ok(val) = std::env::var("LOG_WRITE_OUT") {
            config.default_write_out = val.to_lowercase() == "true";
        }

        if let Ok(val) = std::env::var("LOG_LEVEL") {
            if let Ok(level) = val.parse() {
                config.initial_level = level;
            }
        }

        if let Ok(val) = std::env::var("LOG_FORCE_INTERVAL_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                config.force_log_interval = Duration::from_millis(ms);
            }
        }

        if let Ok(val) = std::env::var("LOG_RETRY_LIMIT") {
            if let Ok(limit) = val.parse::<u32>() {
                // 0은 무제한
                config.retry.max_attempts = if limit == 0 { None } else { Some(limit) };
            }
        }

        if let Ok(val) = std::env::var("LOG_RETRY_DELAY_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                config.retry = config.retry.with_delay(Duration::from_millis(ms));
            }
        }

        config
    }

    /// 설정 유효성 검증
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.logs_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("logs_dir must not be empty"));
        }

        if self.file_extension.is_empty() {
            return Err(anyhow::anyhow!("file_extension must not be empty"));
        }

        if self.file_extension.starts_with('.')
            || self.file_extension.contains(std::path::is_separator)
        {
            return Err(anyhow::anyhow!(
                "file_extension must be a bare extension: {}",
                self.file_extension
            ));
        }

        if self.crash_log_path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("crash_log_path must not be empty"));
        }

        self.retry.validate()?;

        Ok(())
    }
}
