//! 로깅 파이프라인 사용 예제
//!
//! 이 예제는 코디네이터의 기록 방식과 레벨 전환, 폴백 동작을 보여줍니다.

use anyhow::Result;
use daylog::logging::{
    init_logging, LogCoordinator, LogRequest, LogSeverity, LoggingConfig, LoggingLevel, MemorySink,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .try_init();

    println!("🎮 로깅 파이프라인 예제 시작");

    // === 예제 1: 기본 사용법 ===
    println!("\n📝 예제 1: 기본 로깅");
    basic_logging_example().await?;

    // === 예제 2: 레벨 전환 ===
    println!("\n⚙️ 예제 2: 로깅 레벨 전환과 감사 기록");
    level_change_example().await?;

    // === 예제 3: 버퍼링과 비동기 기록 ===
    println!("\n⚡ 예제 3: 버퍼링 및 비동기 기록");
    buffered_and_async_example().await?;

    // === 예제 4: 사용자 지정 싱크 ===
    println!("\n🔍 예제 4: 메모리 싱크로 폴백 체인 확인");
    custom_sink_example().await?;

    println!("\n✅ 모든 예제 완료! logs/ 디렉토리에서 생성된 로그를 확인하세요.");
    Ok(())
}

/// 예제 1: 기본적인 기록
async fn basic_logging_example() -> Result<()> {
    let logger = init_logging(LoggingConfig::from_env()).await?;

    logger.debug("기본 레벨(INFO)에서는 기록되지 않음");
    logger.info("서버 시작");
    logger.log(
        LogRequest::new("맵 로딩 지연")
            .details("1250ms")
            .severity(LogSeverity::Warn)
            .write_out(true),
    );
    logger.log_new_line();
    logger.log(LogRequest::new("세이브 파일 손상").severity(LogSeverity::Error).leading_blank_line());

    logger.flush().await?;
    println!("   ✓ 오늘 날짜 로그 파일에 기록됨");

    logger.shutdown().await?;
    Ok(())
}

/// 예제 2: 레벨 전환
async fn level_change_example() -> Result<()> {
    let logger = init_logging(LoggingConfig::from_env()).await?;

    logger.set_logging_level(LogSeverity::Debug);
    logger.debug("이제 디버그 메시지도 기록됨");

    logger.set_logging_level(LoggingLevel::Disabled);
    logger.fatal("비활성 상태에서는 어떤 것도 기록되지 않음");

    logger.set_logging_level(LogSeverity::Info);
    println!("   ✓ 현재 레벨: {}", logger.logging_level());

    logger.shutdown().await?;
    Ok(())
}

/// 예제 3: 버퍼링과 비동기 기록
async fn buffered_and_async_example() -> Result<()> {
    let config = LoggingConfig {
        force_log_interval: Duration::from_millis(200),
        ..LoggingConfig::from_env()
    };
    let logger = init_logging(config).await?;

    for tick in 0..20 {
        logger.log_buffered(LogRequest::new(format!("틱 {}", tick)).details("world update"));
    }

    let handles: Vec<_> = (0..3)
        .filter_map(|i| logger.log_async(format!("백그라운드 작업 {}", i)))
        .collect();
    for handle in handles {
        handle.await?;
    }

    sleep(Duration::from_millis(300)).await;
    println!("   ✓ 디스패치된 명령 수: {}", logger.dispatched());

    logger.shutdown().await?;
    Ok(())
}

/// 예제 4: 사용자 지정 싱크
async fn custom_sink_example() -> Result<()> {
    let sink = Arc::new(MemorySink::new());
    let logger = LogCoordinator::initialize(LoggingConfig::default(), sink.clone()).await?;

    logger.info("정상 기록");
    logger.flush().await?;

    sink.set_fail_primary(true);
    logger.error("기본 경로 실패");
    logger.flush().await?;

    sink.set_fail_recording(true);
    logger.error("크래시 기록도 실패");
    logger.flush().await?;

    println!(
        "   ✓ 기록 {}건, 크래시 기록 {}건, 콘솔 폴백 {}건",
        sink.entries().len(),
        sink.failures().len(),
        sink.final_failures().len()
    );

    logger.shutdown().await?;
    Ok(())
}
