//! 비동기 로깅 파이프라인
//!
//! 심각도 필터링 코디네이터와 날짜별 파일 싱크로 구성됩니다.
//!
//! # 주요 기능
//! - **심각도 필터링**: 현재 레벨 이상만 기록, 비활성 상태 지원
//! - **날짜별 파일 관리**: `{logs_dir}/{YYYY-MM-DD}.{ext}` 에 추가 기록
//! - **논블로킹 디스패치**: 호출자는 기록 완료를 기다리지 않음
//! - **장애 격리**: 기본 경로 → CRASH.log → 콘솔 순으로 폴백, 호출자에게 전파 안 함
//! - **플러그형 싱크**: `LogSink` 트레이트로 백엔드 교체 가능
//!
//! # 사용 예시
//! ```rust,no_run
//! use daylog::logging::{init_logging, LogRequest, LogSeverity, LoggingConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let logger = init_logging(LoggingConfig::default()).await?;
//!
//!     logger.info("서버 시작");
//!     logger.log(LogRequest::new("연결 실패").details("timeout").severity(LogSeverity::Error));
//!
//!     logger.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coordinator;
pub mod file_sink;
pub mod formatter;
pub mod retry;
pub mod severity;
pub mod sink;

pub use config::LoggingConfig;
pub use coordinator::{LogCoordinator, LogRequest};
pub use file_sink::FileSink;
pub use formatter::{LogEntry, LogFormatter};
pub use retry::RetryPolicy;
pub use severity::{LogSeverity, LoggingLevel};
pub use sink::{LogSink, MemorySink, SinkEvent};

use anyhow::Result;

/// 파일 싱크 기반 코디네이터 초기화 헬퍼
///
/// # Examples
/// ```rust,no_run
/// use daylog::logging::{init_logging, LoggingConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let logger = init_logging(LoggingConfig::from_env()).await?;
///     logger.info("게임 시작됨");
///     logger.flush().await?;
///     Ok(())
/// }
/// ```
pub async fn init_logging(config: LoggingConfig) -> Result<LogCoordinator> {
    LogCoordinator::with_file_sink(config).await
}
