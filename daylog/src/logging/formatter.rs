//! 로그 항목과 포매터
//!
//! 로그 한 줄의 형식은 다음과 같습니다.
//!
//! ```text
//! [{HH:MM:SS(.mmm)}] [{threadLabel}/{SEVERITY}]\t: |{message}| {details}
//! ```

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::logging::severity::LogSeverity;

/// 날짜 파일명 / 크래시 스탬프용 날짜 형식
pub const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const TIME_FORMAT_MILLIS: &str = "%H:%M:%S%.3f";

tokio::task_local! {
    /// 비동기 로깅 태스크 동안만 유효한 스레드 레이블
    static THREAD_LABEL: String;
}

/// 현재 실행 흐름의 레이블
///
/// 태스크 로컬 레이블이 있으면 그것을, 없으면 스레드 이름(또는 ID)을 사용합니다.
pub fn current_thread_label() -> String {
    if let Ok(label) = THREAD_LABEL.try_with(|label| label.clone()) {
        return label;
    }

    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

/// `label`을 스레드 레이블로 지정한 채 `f` 실행
pub fn with_thread_label<F, R>(label: String, f: F) -> R
where
    F: FnOnce() -> R,
{
    THREAD_LABEL.sync_scope(label, f)
}

/// 시각 포매팅
pub fn format_time(timestamp: &NaiveDateTime, millis: bool) -> String {
    let format = if millis { TIME_FORMAT_MILLIS } else { TIME_FORMAT };
    timestamp.format(format).to_string()
}

/// 로그 항목
///
/// 생성된 뒤에는 변경되지 않으며 싱크로 넘겨질 때까지 만든 호출이 소유합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// 로컬 시각
    pub timestamp: NaiveDateTime,
    pub severity: LogSeverity,
    /// 항목을 만든 스레드 레이블
    pub thread_label: String,
    pub message: String,
    pub details: Option<String>,
    /// 시각에 밀리초 포함 여부
    pub include_millis: bool,
}

impl LogEntry {
    /// 현재 시각과 현재 스레드 레이블로 새 항목 생성
    pub fn new<S: Into<String>>(severity: LogSeverity, message: S) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            severity,
            thread_label: current_thread_label(),
            message: message.into(),
            details: None,
            include_millis: true,
        }
    }

    pub fn with_details<S: Into<String>>(mut self, details: S) -> Self {
        let details = details.into();
        self.details = if details.is_empty() { None } else { Some(details) };
        self
    }

    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_thread_label<S: Into<String>>(mut self, label: S) -> Self {
        self.thread_label = label.into();
        self
    }

    pub fn with_millis(mut self, include_millis: bool) -> Self {
        self.include_millis = include_millis;
        self
    }

    /// 항목이 속한 달력 날짜
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// 파일에 기록될 한 줄 (줄바꿈 제외)
    pub fn format_line(&self) -> String {
        format!(
            "[{}] [{}/{}]\t: |{}| {}",
            format_time(&self.timestamp, self.include_millis),
            self.thread_label,
            self.severity.as_str(),
            self.message,
            self.details.as_deref().unwrap_or(""),
        )
    }
}

/// 로그 포매터
///
/// 코디네이터 설정(밀리초 포함 여부)을 항목 생성 시점에 적용합니다.
#[derive(Debug, Clone, Copy)]
pub struct LogFormatter {
    log_milliseconds: bool,
}

impl LogFormatter {
    pub fn new(log_milliseconds: bool) -> Self {
        Self { log_milliseconds }
    }

    /// 호출 스레드 기준으로 항목 생성
    pub fn entry(&self, severity: LogSeverity, message: &str, details: &str) -> LogEntry {
        LogEntry::new(severity, message)
            .with_details(details)
            .with_millis(self.log_milliseconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_milli_opt(h, m, s, ms)
            .unwrap()
    }

    #[test]
    fn test_format_line_with_details() {
        let entry = LogEntry::new(LogSeverity::Warn, "disk almost full")
            .with_details("93%")
            .with_timestamp(at(7, 5, 3, 42))
            .with_thread_label("main");

        assert_eq!(
            entry.format_line(),
            "[07:05:03.042] [main/WARN]\t: |disk almost full| 93%"
        );
    }

    #[test]
    fn test_format_line_without_millis_or_details() {
        let entry = LogEntry::new(LogSeverity::Info, "ready")
            .with_timestamp(at(23, 59, 59, 999))
            .with_thread_label("worker")
            .with_millis(false);

        assert_eq!(entry.format_line(), "[23:59:59] [worker/INFO]\t: |ready| ");
        assert_eq!(entry.date(), NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
    }

    #[test]
    fn test_thread_label_scope() {
        let outside = current_thread_label();
        let inside = with_thread_label("main(async)".to_string(), current_thread_label);

        assert_eq!(inside, "main(async)");
        assert_eq!(current_thread_label(), outside);
    }

    #[test]
    fn test_formatter_applies_millis_setting() {
        let entry = LogFormatter::new(false).entry(LogSeverity::Debug, "x", "");
        assert!(!entry.include_millis);
        assert!(entry.details.is_none());
        assert_eq!(entry.thread_label, current_thread_label());
    }
}
