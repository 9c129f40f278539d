//! 날짜별 파일 싱크
//!
//! 항목을 달력 날짜별로 묶어 `{logs_dir}/{YYYY-MM-DD}.{ext}` 파일에 추가합니다.
//! 파일 경합 시에는 `RetryPolicy`에 따라 쓰기 전체를 다시 시도하고,
//! 실패 기록은 CRASH.log, 그마저 실패하면 표준 출력으로 내려갑니다.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

use crate::error::{LogError, Result};
use crate::logging::config::LoggingConfig;
use crate::logging::formatter::{format_time, LogEntry, DATE_FORMAT};
use crate::logging::retry::RetryPolicy;
use crate::logging::sink::LogSink;

/// 크래시 로그 파일 이름
pub const CRASH_LOG_FILE_NAME: &str = "CRASH.log";

/// 날짜별 파일 싱크
#[derive(Debug, Clone)]
pub struct FileSink {
    /// 로그 디렉토리
    logs_dir: PathBuf,
    /// 로그 파일 확장자 (점 제외)
    file_extension: String,
    /// 크래시 로그 파일 경로
    crash_log_path: PathBuf,
    /// 경합 재시도 정책
    retry: RetryPolicy,
}

impl FileSink {
    pub fn new<P: AsRef<Path>, S: Into<String>>(logs_dir: P, file_extension: S) -> Self {
        Self {
            logs_dir: logs_dir.as_ref().to_path_buf(),
            file_extension: file_extension.into(),
            crash_log_path: PathBuf::from(CRASH_LOG_FILE_NAME),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self::new(&config.logs_dir, config.file_extension.clone())
            .with_crash_log_path(&config.crash_log_path)
            .with_retry_policy(config.retry.clone())
    }

    pub fn with_crash_log_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.crash_log_path = path.as_ref().to_path_buf();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn crash_log_path(&self) -> &Path {
        &self.crash_log_path
    }

    /// 주어진 날짜의 로그 파일 경로
    pub fn log_file_path(&self, date: NaiveDate) -> PathBuf {
        self.logs_dir
            .join(format!("{}.{}", date.format(DATE_FORMAT), self.file_extension))
    }

    /// 오늘 날짜의 로그 파일 경로
    pub fn todays_file_path(&self) -> PathBuf {
        self.log_file_path(Local::now().date_naive())
    }

    /// 디렉토리 보장 + 추가 쓰기를 재시도 정책 아래에서 수행
    async fn append(&self, path: &Path, text: &str) -> Result<()> {
        self.retry
            .execute(path, || append_once(&self.logs_dir, path, text))
            .await
    }
}

/// 한 번의 쓰기 시도
///
/// 매번 디렉토리를 다시 보장하므로 실행 중 디렉토리가 삭제되어도 복구됩니다.
async fn append_once(dir: &Path, path: &Path, text: &str) -> io::Result<()> {
    fs::create_dir_all(dir).await?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;

    file.write_all(text.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

/// 콘솔 에코 한 줄: `{path} -> {text}`
fn write_echo(
    out: &mut impl io::Write,
    path: &Path,
    text: &str,
    leading_blank_line: bool,
) -> io::Result<()> {
    let prefix = if leading_blank_line { "\n" } else { "" };
    writeln!(out, "{}{} -> {}", prefix, path.display(), text)
}

/// 폴백 체인의 마지막 줄
fn write_final_failure(out: &mut impl io::Write, failure: &LogError) -> io::Result<()> {
    writeln!(out, "\nLogger exception level 2: {}", failure)
}

#[async_trait]
impl LogSink for FileSink {
    async fn persist_batch(&self, entries: Vec<LogEntry>, leading_blank_line: bool) -> Result<()> {
        let mut lines: Vec<(NaiveDate, String)> = entries
            .iter()
            .map(|entry| (entry.date(), entry.format_line()))
            .collect();

        // 가장 최근 줄 앞에 빈 줄 삽입
        if leading_blank_line {
            if let Some((_, last)) = lines.last_mut() {
                last.insert(0, '\n');
            }
        }

        let mut rest = lines.as_slice();
        while let Some((date, _)) = rest.first() {
            let date = *date;
            let run = rest.iter().take_while(|(d, _)| *d == date).count();
            let (chunk, tail) = rest.split_at(run);

            let mut text = chunk
                .iter()
                .map(|(_, line)| line.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            text.push('\n');

            let path = self.log_file_path(date);
            self.append(&path, &text).await?;
            debug!(path = %path.display(), entries = run, "로그 항목 기록됨");

            rest = tail;
        }

        Ok(())
    }

    async fn persist_blank_line(&self) -> Result<()> {
        let path = self.todays_file_path();
        self.append(&path, "\n").await
    }

    async fn echo_to_operator(&self, text: &str, leading_blank_line: bool) {
        let path = self.todays_file_path();
        let _ = write_echo(&mut io::stdout().lock(), &path, text, leading_blank_line);
    }

    async fn record_failure(&self, failure: &LogError) -> Result<()> {
        fs::create_dir_all(&self.logs_dir)
            .await
            .map_err(|source| LogError::Io {
                path: self.logs_dir.clone(),
                source,
            })?;

        let now = Local::now().naive_local();
        let block = format!(
            "\n[{}_{}] [LOGGING CRASHED]\t: |{}|\n",
            now.format(DATE_FORMAT),
            format_time(&now, true),
            failure.full_text()
        );

        let io_error = |source| LogError::Io {
            path: self.crash_log_path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.crash_log_path)
            .await
            .map_err(io_error)?;
        file.write_all(block.as_bytes()).await.map_err(io_error)?;
        file.flush().await.map_err(io_error)?;

        error!(
            crash_log = %self.crash_log_path.display(),
            error = %failure,
            "로깅 파이프라인 실패가 크래시 로그에 기록됨"
        );
        Ok(())
    }

    fn record_final_failure(&self, failure: &LogError) {
        let _ = write_final_failure(&mut io::stdout().lock(), failure);
    }
}
