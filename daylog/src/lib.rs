//! 날짜별 파일에 기록하는 비동기 로깅 라이브러리

pub mod error;
pub mod logging;

pub use error::LogError;
pub use logging::{init_logging, LogCoordinator, LogRequest, LogSeverity, LoggingConfig, LoggingLevel};
