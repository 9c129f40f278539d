//! 로깅 파이프라인 통합 테스트
//!
//! 실제 파일 시스템 위에서 코디네이터와 파일 싱크를 함께 검증합니다.

use anyhow::Result;
use chrono::{Local, NaiveDate};
use daylog::logging::{
    config::LoggingConfig,
    coordinator::{LogCoordinator, LogRequest},
    file_sink::FileSink,
    formatter::LogEntry,
    init_logging,
    retry::RetryPolicy,
    severity::{LogSeverity, LoggingLevel},
    sink::LogSink,
};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_test::assert_ok;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn test_config(root: &Path) -> LoggingConfig {
    LoggingConfig {
        logs_dir: root.join("logs"),
        crash_log_path: root.join("CRASH.log"),
        force_log_interval: Duration::from_millis(50),
        retry: RetryPolicy::unbounded().with_delay(Duration::from_millis(5)),
        ..Default::default()
    }
}

async fn todays_log(root: &Path) -> Result<String> {
    let today = Local::now().format("%Y-%m-%d").to_string();
    Ok(fs::read_to_string(root.join("logs").join(format!("{}.log", today))).await?)
}

/// 필터링된 항목은 파일을 만들지 않고, 통과한 항목은 형식대로 기록됨
#[tokio::test]
async fn test_severity_filtered_file_output() -> Result<()> {
    init_tracing();
    let temp_dir = TempDir::new()?;
    let logger = init_logging(test_config(temp_dir.path())).await?;

    logger.log(LogRequest::new("x").severity(LogSeverity::Debug));
    assert_ok!(logger.flush().await);
    assert!(!temp_dir.path().join("logs").exists(), "필터링된 항목이 기록됨");

    logger.log(LogRequest::new("y").severity(LogSeverity::Warn));
    assert_ok!(logger.flush().await);

    let content = todays_log(temp_dir.path()).await?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("/WARN]\t: |y| "));
    assert!(lines[0].starts_with('['));
    assert!(content.ends_with('\n'));

    logger.shutdown().await?;
    Ok(())
}

/// 이틀에 걸친 배치는 날짜별 파일 두 개로 나뉨
#[tokio::test]
async fn test_batch_spanning_midnight_creates_two_files() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = test_config(temp_dir.path());
    let sink = FileSink::from_config(&config);

    let day_one = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
    let day_two = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let entries = vec![
        LogEntry::new(LogSeverity::Info, "old year")
            .with_timestamp(day_one.and_hms_opt(23, 59, 59).unwrap()),
        LogEntry::new(LogSeverity::Info, "new year")
            .with_timestamp(day_two.and_hms_opt(0, 0, 1).unwrap()),
    ];

    sink.persist_batch(entries, false).await?;

    let first = fs::read_to_string(sink.log_file_path(day_one)).await?;
    let second = fs::read_to_string(sink.log_file_path(day_two)).await?;
    assert_eq!(first.lines().count(), 1);
    assert_eq!(second.lines().count(), 1);
    assert!(first.contains("|old year|"));
    assert!(second.contains("|new year|"));

    Ok(())
}

/// 파일 경합이 풀릴 때까지 재시도하고 항목은 한 번만 기록됨
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_contended_write_eventually_succeeds_once() -> Result<()> {
    init_tracing();
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("2024-06-01.log");
    let policy = RetryPolicy::unbounded().with_delay(Duration::from_millis(5));

    // 다른 작성자가 파일을 잡고 있는 동안 열기는 WouldBlock으로 실패함
    let held = Arc::new(AtomicBool::new(true));
    let release = {
        let held = held.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            held.store(false, Ordering::SeqCst);
        })
    };

    let attempts = Arc::new(AtomicU32::new(0));
    policy
        .execute(&path, || {
            let held = held.clone();
            let attempts = attempts.clone();
            let path = path.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                if held.load(Ordering::SeqCst) {
                    return Err(io::Error::new(io::ErrorKind::WouldBlock, "locked"));
                }
                let mut file = fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .await?;
                file.write_all(b"|contended|\n").await
            }
        })
        .await?;
    release.await?;

    let content = fs::read_to_string(&path).await?;
    assert_eq!(content, "|contended|\n");
    assert!(attempts.load(Ordering::SeqCst) > 1);

    Ok(())
}

/// 로그 디렉토리가 삭제되어도 다음 기록 때 다시 생성됨
#[tokio::test]
async fn test_logs_directory_is_recreated() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let logger = init_logging(test_config(temp_dir.path())).await?;

    logger.info("first");
    logger.flush().await?;
    fs::remove_dir_all(temp_dir.path().join("logs")).await?;

    logger.info("second");
    logger.log_new_line();
    logger.info("third");
    logger.flush().await?;

    let content = todays_log(temp_dir.path()).await?;
    assert!(!content.contains("|first|"));
    assert!(content.contains("|second|"));
    assert!(content.contains("|third|"));
    assert!(content.contains(" \n\n["), "빈 줄이 기록되지 않음");
    assert!(!temp_dir.path().join("CRASH.log").exists());

    Ok(())
}

/// 기본 경로가 실패하면 CRASH.log 에 기록되고 호출자는 영향받지 않음
///
/// 무제한 재시도 정책이어도 경합이 아닌 에러는 곧바로 크래시 로그로 넘어감
#[tokio::test]
async fn test_primary_failure_is_recorded_in_crash_log() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = LoggingConfig {
        retry: RetryPolicy::unbounded(),
        ..test_config(temp_dir.path())
    };
    let logger = init_logging(config).await?;

    // 오늘 날짜 파일 자리에 디렉토리를 만들어 열기가 실패하게 함
    let today = Local::now().format("%Y-%m-%d").to_string();
    fs::create_dir_all(temp_dir.path().join("logs").join(format!("{}.log", today))).await?;

    logger.error("cannot be written");
    logger.info("neither can this");
    tokio::time::timeout(Duration::from_secs(2), logger.flush()).await??;

    let crash = fs::read_to_string(temp_dir.path().join("CRASH.log")).await?;
    assert!(crash.starts_with(&format!("\n[{}_", today)));
    assert_eq!(crash.matches("] [LOGGING CRASHED]\t: |로그 파일 I/O 실패 (").count(), 2);
    assert!(crash.ends_with("|\n"));

    logger.shutdown().await?;
    Ok(())
}

/// 크래시 로그마저 실패해도 호출자에게 전파되지 않음
#[tokio::test]
async fn test_crash_log_failure_is_contained() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let crash_dir = temp_dir.path().join("CRASH.log");
    fs::create_dir_all(&crash_dir).await?;
    fs::write(temp_dir.path().join("logs"), b"blocked").await?;

    let config = LoggingConfig {
        retry: RetryPolicy::limited(1),
        ..test_config(temp_dir.path())
    };
    let logger = init_logging(config).await?;

    logger.fatal("nowhere to go");
    logger.flush().await?;

    // 크래시 경로는 여전히 디렉토리이고 아무것도 기록되지 않음
    assert!(crash_dir.is_dir());
    let mut entries = fs::read_dir(&crash_dir).await?;
    assert!(entries.next_entry().await?.is_none());

    Ok(())
}

/// 여러 스레드에서 동시에 기록해도 모든 항목이 남고 스레드별 순서가 유지됨
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_logging_from_threads() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let logger = Arc::new(init_logging(test_config(temp_dir.path())).await?);

    let mut handles = vec![];
    for thread_id in 0..8 {
        let logger = logger.clone();
        let handle = std::thread::Builder::new()
            .name(format!("game-{}", thread_id))
            .spawn(move || {
                for seq in 0..25 {
                    logger.log(LogRequest::new(format!("t{} m{}", thread_id, seq)).details("tick"));
                }
            })?;
        handles.push(handle);
    }
    for handle in handles {
        handle.join().expect("로깅 스레드 패닉");
    }
    logger.flush().await?;

    let content = todays_log(temp_dir.path()).await?;
    assert_eq!(content.lines().count(), 200);

    for thread_id in 0..8 {
        let label = format!("[game-{}/INFO]", thread_id);
        let seqs: Vec<usize> = content
            .lines()
            .filter(|line| line.contains(&label))
            .map(|line| {
                let start = line.find(" m").unwrap() + 2;
                let end = line[start..].find('|').unwrap() + start;
                line[start..end].parse().unwrap()
            })
            .collect();
        assert_eq!(seqs, (0..25).collect::<Vec<_>>());
    }

    Ok(())
}

/// 레벨 변경 감사 기록이 파일에 남음
#[tokio::test]
async fn test_level_changes_are_written_to_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let logger = init_logging(test_config(temp_dir.path())).await?;

    logger.set_logging_level(LogSeverity::Warn);
    logger.info("suppressed");
    logger.set_logging_level(LoggingLevel::Disabled);
    logger.set_logging_level(LogSeverity::Info);
    logger.info("visible again");
    logger.flush().await?;

    let content = todays_log(temp_dir.path()).await?;
    let messages: Vec<&str> = content
        .lines()
        .filter_map(|line| line.split('|').nth(1))
        .collect();
    assert_eq!(
        messages,
        vec![
            "Logging level changed: INFO -> WARN",
            "Logging disabled",
            "Logging enabled",
            "visible again",
        ]
    );

    Ok(())
}

/// 비동기 기록은 `(async)` 레이블로 기록됨
#[tokio::test]
async fn test_log_async_writes_with_async_label() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let logger = init_logging(test_config(temp_dir.path())).await?;

    let handles: Vec<_> = (0..5)
        .filter_map(|i| logger.log_async(format!("async {}", i)))
        .collect();
    assert_eq!(handles.len(), 5);
    for handle in handles {
        handle.await?;
    }
    logger.flush().await?;

    let content = todays_log(temp_dir.path()).await?;
    assert_eq!(content.lines().count(), 5);
    assert!(content.lines().all(|line| line.contains("(async)/INFO]")));
    for i in 0..5 {
        assert!(content.contains(&format!("|async {}|", i)));
    }

    Ok(())
}

/// 버퍼링된 항목은 강제 기록 간격이 지나면 파일에 나타남
#[tokio::test]
async fn test_buffered_logging_reaches_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let logger = init_logging(test_config(temp_dir.path())).await?;

    for i in 0..10 {
        logger.log_buffered(format!("buffered {}", i));
    }
    tokio::time::sleep(Duration::from_millis(250)).await;

    let content = todays_log(temp_dir.path()).await?;
    assert_eq!(content.lines().count(), 10);

    logger.shutdown().await?;
    Ok(())
}

/// 재초기화 후에는 새 디렉토리와 확장자로 기록됨
#[tokio::test]
async fn test_reinitialize_switches_files() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let logger = init_logging(test_config(temp_dir.path())).await?;
    logger.info("before");

    let other_root = temp_dir.path().join("other");
    let config = LoggingConfig {
        file_extension: "txt".to_string(),
        log_milliseconds: false,
        ..test_config(&other_root)
    };
    let sink = Arc::new(FileSink::from_config(&config));
    logger.reinitialize(config, sink.clone()).await?;
    logger.info("after");
    logger.flush().await?;

    let before = todays_log(temp_dir.path()).await?;
    let after = fs::read_to_string(sink.todays_file_path()).await?;
    assert!(before.contains("|before|"));
    assert!(!before.contains("|after|"));
    assert!(after.contains("|after|"));
    assert!(sink.todays_file_path().extension().unwrap() == "txt");
    assert!(!logger.log_milliseconds());

    Ok(())
}

/// 환경변수 설정 테스트
#[tokio::test]
async fn test_config_from_env() -> Result<()> {
    std::env::set_var("LOG_FILE_EXTENSION", "txt");
    std::env::set_var("LOG_LEVEL", "warn");
    std::env::set_var("LOG_WRITE_OUT", "true");
    std::env::set_var("LOG_RETRY_LIMIT", "4");

    let config = LoggingConfig::from_env();

    assert_eq!(config.file_extension, "txt");
    assert_eq!(config.initial_level, LoggingLevel::Enabled(LogSeverity::Warn));
    assert!(config.default_write_out);
    assert_eq!(config.retry.max_attempts, Some(4));
    assert!(config.validate().is_ok());

    std::env::remove_var("LOG_FILE_EXTENSION");
    std::env::remove_var("LOG_LEVEL");
    std::env::remove_var("LOG_WRITE_OUT");
    std::env::remove_var("LOG_RETRY_LIMIT");

    Ok(())
}

/// 사용자 지정 싱크도 같은 계약으로 동작함
#[tokio::test]
async fn test_custom_sink_injection() -> Result<()> {
    let sink = Arc::new(daylog::logging::MemorySink::new());
    let logger = LogCoordinator::initialize(LoggingConfig::default(), sink.clone()).await?;

    logger.pass("all checks green");
    logger.fail("one check red");
    logger.flush().await?;

    let severities: Vec<LogSeverity> = sink.entries().iter().map(|e| e.severity).collect();
    assert_eq!(severities, vec![LogSeverity::Pass, LogSeverity::Fail]);

    Ok(())
}
