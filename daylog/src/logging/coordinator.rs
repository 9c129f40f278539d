//! 로그 코디네이터
//!
//! 심각도 필터링, 포매팅, 싱크로의 디스패치를 담당하는 공개 로깅 API입니다.
//!
//! 모든 디스패치는 하나의 무제한 채널을 거쳐 전용 작성기 태스크가 순서대로
//! 싱크에 전달합니다. 따라서 같은 스레드에서 호출한 `log`는 호출 순서대로
//! 싱크에 도착합니다. `log_async`는 별도 태스크에서 실행되므로 이 순서 보장이
//! 없습니다.
//!
//! 싱크 호출이 실패하면 `record_failure`, 그마저 실패하면
//! `record_final_failure`로 내려가며, 어떤 실패도 호출자에게 전파되지 않습니다.

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::error::LogError;
use crate::logging::config::LoggingConfig;
use crate::logging::file_sink::FileSink;
use crate::logging::formatter::{current_thread_label, with_thread_label, LogEntry, LogFormatter};
use crate::logging::severity::{LogSeverity, LoggingLevel};
use crate::logging::sink::LogSink;

/// 로그 요청
///
/// 기본값: 상세 없음, INFO, 콘솔 에코는 코디네이터 기본값을 따름, 빈 줄 없음.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRequest {
    pub message: String,
    pub details: String,
    pub severity: LogSeverity,
    /// `None`이면 코디네이터의 `default_write_out`을 따름
    pub write_out: Option<bool>,
    pub leading_blank_line: bool,
}

impl LogRequest {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            details: String::new(),
            severity: LogSeverity::Info,
            write_out: None,
            leading_blank_line: false,
        }
    }

    pub fn details<S: Into<String>>(mut self, details: S) -> Self {
        self.details = details.into();
        self
    }

    pub fn severity(mut self, severity: LogSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn write_out(mut self, write_out: bool) -> Self {
        self.write_out = Some(write_out);
        self
    }

    pub fn leading_blank_line(mut self) -> Self {
        self.leading_blank_line = true;
        self
    }
}

impl From<&str> for LogRequest {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for LogRequest {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// 코디네이터 설정 상태
#[derive(Debug, Clone, Copy, PartialEq)]
struct CoordinatorState {
    level: LoggingLevel,
    default_write_out: bool,
    log_milliseconds: bool,
    force_log_interval: Duration,
}

/// 작성기 태스크로 보내는 명령
#[derive(Debug)]
enum WriteCommand {
    /// 항목들을 즉시 기록
    Persist {
        seq: u64,
        entries: Vec<LogEntry>,
        leading_blank_line: bool,
    },
    /// 대기 배치에 추가
    Buffer {
        seq: u64,
        entry: LogEntry,
        leading_blank_line: bool,
    },
    /// 빈 줄 기록
    BlankLine { seq: u64 },
    /// 콘솔 에코
    Echo {
        seq: u64,
        text: String,
        leading_blank_line: bool,
    },
    /// 앞선 명령이 모두 싱크에 전달되면 응답
    Flush { ack: oneshot::Sender<()> },
    /// 남은 명령을 처리한 뒤 종료
    Shutdown,
}

/// 제출 방식
#[derive(Debug, Clone, Copy, PartialEq)]
enum Submission {
    Direct,
    Buffered,
    /// 레벨 필터를 거치지 않는 활성/비활성 감사 기록
    Audit,
}

/// 한 번의 초기화로 만들어진 상태 전체
struct Pipeline {
    state: RwLock<CoordinatorState>,
    /// 레벨 변경끼리만 직렬화
    level_change: Mutex<()>,
    sink: Arc<dyn LogSink>,
    sender: mpsc::UnboundedSender<WriteCommand>,
    sequence: AtomicU64,
    writer_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Pipeline {
    fn start(config: &LoggingConfig, sink: Arc<dyn LogSink>) -> Result<Self> {
        config.validate().context("로깅 설정 유효성 검증 실패")?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let writer_handle = tokio::spawn(writer_task(
            sink.clone(),
            receiver,
            config.force_log_interval,
        ));

        Ok(Self {
            state: RwLock::new(CoordinatorState {
                level: config.initial_level,
                default_write_out: config.default_write_out,
                log_milliseconds: config.log_milliseconds,
                force_log_interval: config.force_log_interval,
            }),
            level_change: Mutex::new(()),
            sink,
            sender,
            sequence: AtomicU64::new(0),
            writer_handle: Mutex::new(Some(writer_handle)),
        })
    }

    fn state(&self) -> CoordinatorState {
        *self.state.read()
    }

    fn log(&self, request: LogRequest, submission: Submission) {
        if let Err(e) = self.submit(request, submission) {
            self.handle_failure(e);
        }
    }

    fn submit(&self, request: LogRequest, submission: Submission) -> Result<(), LogError> {
        let state = self.state();
        let permitted = match submission {
            Submission::Audit => true,
            _ => state.level.permits(request.severity),
        };
        if !permitted {
            return Ok(());
        }

        let entry = LogFormatter::new(state.log_milliseconds).entry(
            request.severity,
            &request.message,
            &request.details,
        );
        let echo = request
            .write_out
            .unwrap_or(state.default_write_out)
            .then(|| entry.format_line());
        let leading_blank_line = request.leading_blank_line;

        if submission == Submission::Buffered && !state.force_log_interval.is_zero() {
            self.send(|seq| WriteCommand::Buffer {
                seq,
                entry,
                leading_blank_line,
            })?;
        } else {
            self.send(|seq| WriteCommand::Persist {
                seq,
                entries: vec![entry],
                leading_blank_line,
            })?;
        }

        if let Some(text) = echo {
            self.send(|seq| WriteCommand::Echo {
                seq,
                text,
                leading_blank_line,
            })?;
        }

        Ok(())
    }

    fn log_new_line(&self) {
        if !self.state().level.is_enabled() {
            return;
        }
        if let Err(e) = self.send(|seq| WriteCommand::BlankLine { seq }) {
            self.handle_failure(e);
        }
    }

    fn send<F>(&self, build: F) -> Result<(), LogError>
    where
        F: FnOnce(u64) -> WriteCommand,
    {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        self.sender
            .send(build(seq))
            .map_err(|_| LogError::ChannelClosed)
    }

    /// 호출 측에서 난 실패를 폴백 체인으로 전달
    ///
    /// 런타임 밖에서는 임시 current-thread 런타임으로 크래시 기록까지 마친 뒤
    /// 반환합니다. 그 런타임조차 만들 수 없으면 바로 콘솔로 내려갑니다.
    fn handle_failure(&self, error: LogError) {
        warn!(error = %error, "로그 디스패치 실패");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let sink = self.sink.clone();
                handle.spawn(async move {
                    report_failure(sink.as_ref(), error).await;
                });
            }
            Err(_) => match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime.block_on(report_failure(self.sink.as_ref(), error)),
                Err(e) => {
                    warn!(error = %e, "실패 기록용 런타임 생성 실패");
                    self.sink.record_final_failure(&error);
                }
            },
        }
    }

    fn set_logging_level(&self, new_level: LoggingLevel) {
        let _guard = self.level_change.lock();

        let old_level = self.state().level;
        if old_level == new_level {
            return;
        }

        // 이전 레벨 기준으로 필터링됨
        self.log(
            LogRequest::new(format!(
                "Logging level changed: {} -> {}",
                old_level, new_level
            )),
            Submission::Direct,
        );

        self.state.write().level = new_level;

        if old_level.is_enabled() != new_level.is_enabled() {
            let message = if new_level.is_enabled() {
                "Logging enabled"
            } else {
                "Logging disabled"
            };
            self.log(LogRequest::new(message), Submission::Audit);
        }

        debug!(old = %old_level, new = %new_level, "로깅 레벨 변경됨");
    }

    async fn flush(&self) -> Result<(), LogError> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(WriteCommand::Flush { ack })
            .map_err(|_| LogError::ChannelClosed)?;
        done.await.map_err(|_| LogError::ChannelClosed)
    }

    /// 작성기에 종료를 요청하고 남은 명령이 처리될 때까지 대기
    async fn stop(&self) -> Result<(), LogError> {
        let _ = self.sender.send(WriteCommand::Shutdown);

        let handle = self.writer_handle.lock().take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| LogError::Task(e.to_string()))?;
        }
        Ok(())
    }
}

/// 싱크 호출 결과를 폴백 체인에 태움
async fn deliver(sink: &dyn LogSink, result: Result<(), LogError>) {
    if let Err(error) = result {
        report_failure(sink, error).await;
    }
}

/// 1단계: 크래시 로그, 2단계: 콘솔
async fn report_failure(sink: &dyn LogSink, error: LogError) {
    if let Err(secondary) = sink.record_failure(&error).await {
        warn!(
            error = %error,
            secondary = %secondary,
            "크래시 로그 기록 실패, 콘솔로 보고"
        );
        sink.record_final_failure(&secondary);
    }
}

async fn flush_pending(sink: &dyn LogSink, pending: &mut Vec<LogEntry>, leading_blank_line: bool) {
    if pending.is_empty() {
        return;
    }
    let batch = std::mem::take(pending);
    deliver(sink, sink.persist_batch(batch, leading_blank_line).await).await;
}

fn observe_sequence(last_seq: &mut Option<u64>, seq: u64) {
    if let Some(last) = *last_seq {
        if seq < last {
            // 서로 다른 스레드의 디스패치가 교차한 경우
            trace!(seq, last, "디스패치 순서 역전 관찰됨");
        }
    }
    *last_seq = Some(seq);
}

/// 전용 작성기 태스크
///
/// 명령을 채널 순서대로 처리합니다. 버퍼링된 항목은 `force_log_interval`마다,
/// 또는 다른 기록/플러시/종료 명령 직전에 하나의 배치로 기록됩니다.
async fn writer_task(
    sink: Arc<dyn LogSink>,
    mut receiver: mpsc::UnboundedReceiver<WriteCommand>,
    force_log_interval: Duration,
) {
    let sink = sink.as_ref();
    let period = if force_log_interval.is_zero() {
        Duration::from_secs(3600)
    } else {
        force_log_interval
    };
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut pending: Vec<LogEntry> = Vec::new();
    let mut last_seq: Option<u64> = None;

    debug!(force_log_interval = ?force_log_interval, "로그 작성기 태스크 시작됨");

    loop {
        tokio::select! {
            cmd = receiver.recv() => {
                match cmd {
                    Some(WriteCommand::Persist { seq, entries, leading_blank_line }) => {
                        observe_sequence(&mut last_seq, seq);
                        flush_pending(sink, &mut pending, false).await;
                        deliver(sink, sink.persist_batch(entries, leading_blank_line).await).await;
                    }
                    Some(WriteCommand::Buffer { seq, entry, leading_blank_line }) => {
                        observe_sequence(&mut last_seq, seq);
                        pending.push(entry);
                        // 빈 줄은 이 항목 바로 앞에 와야 하므로 즉시 기록
                        if leading_blank_line {
                            flush_pending(sink, &mut pending, true).await;
                        }
                    }
                    Some(WriteCommand::BlankLine { seq }) => {
                        observe_sequence(&mut last_seq, seq);
                        flush_pending(sink, &mut pending, false).await;
                        deliver(sink, sink.persist_blank_line().await).await;
                    }
                    Some(WriteCommand::Echo { seq, text, leading_blank_line }) => {
                        observe_sequence(&mut last_seq, seq);
                        sink.echo_to_operator(&text, leading_blank_line).await;
                    }
                    Some(WriteCommand::Flush { ack }) => {
                        flush_pending(sink, &mut pending, false).await;
                        let _ = ack.send(());
                    }
                    Some(WriteCommand::Shutdown) => {
                        // 이미 받은 명령은 계속 처리하고 새 명령은 거부
                        receiver.close();
                    }
                    None => {
                        flush_pending(sink, &mut pending, false).await;
                        debug!("로그 작성기 태스크 종료");
                        return;
                    }
                }
            }

            _ = ticker.tick(), if !pending.is_empty() => {
                flush_pending(sink, &mut pending, false).await;
            }
        }
    }
}

/// 로그 코디네이터
///
/// 애플리케이션 조립 지점에서 명시적으로 생성해 필요한 컴포넌트에 전달합니다.
/// 재초기화는 상태 전체(설정, 싱크, 채널, 작성기)를 한 번에 교체합니다.
/// 디스패치는 읽기 잠금 아래에서 이루어지므로 교체 전에 보낸 명령은 이전
/// 작성기가, 교체 후에 보낸 명령은 새 작성기가 처리합니다.
pub struct LogCoordinator {
    pipeline: Arc<RwLock<Arc<Pipeline>>>,
}

impl LogCoordinator {
    /// 주어진 싱크로 코디네이터 생성 (tokio 런타임 안에서 호출)
    pub async fn initialize(config: LoggingConfig, sink: Arc<dyn LogSink>) -> Result<Self> {
        let pipeline = Pipeline::start(&config, sink)?;

        info!(
            logs_dir = %config.logs_dir.display(),
            level = %config.initial_level,
            "로그 코디네이터 초기화 완료"
        );

        Ok(Self {
            pipeline: Arc::new(RwLock::new(Arc::new(pipeline))),
        })
    }

    /// 설정으로부터 `FileSink`를 만들어 코디네이터 생성
    pub async fn with_file_sink(config: LoggingConfig) -> Result<Self> {
        let sink = Arc::new(FileSink::from_config(&config));
        Self::initialize(config, sink).await
    }

    /// 상태 전체를 새 설정과 싱크로 교체
    ///
    /// 이전 작성기는 이미 받은 명령을 모두 처리한 뒤 종료됩니다.
    pub async fn reinitialize(&self, config: LoggingConfig, sink: Arc<dyn LogSink>) -> Result<()> {
        let pipeline = Arc::new(Pipeline::start(&config, sink)?);
        let previous = std::mem::replace(&mut *self.pipeline.write(), pipeline);

        previous
            .stop()
            .await
            .context("이전 로그 작성기 종료 실패")?;

        info!(
            logs_dir = %config.logs_dir.display(),
            level = %config.initial_level,
            "로그 코디네이터 재초기화 완료"
        );
        Ok(())
    }

    fn current(&self) -> Arc<Pipeline> {
        self.pipeline.read().clone()
    }

    /// 항목을 기록 (디스패치 후 즉시 반환)
    pub fn log<R: Into<LogRequest>>(&self, request: R) {
        self.pipeline.read().log(request.into(), Submission::Direct);
    }

    /// 별도 태스크에서 필터링부터 디스패치까지 수행
    ///
    /// 스레드 레이블은 `{호출 스레드}(async)`가 됩니다. 다른 `log`/`log_async`
    /// 호출과의 순서는 보장되지 않습니다. 태스크가 실행될 때의 상태를 사용하므로
    /// 그 사이 재초기화가 있으면 새 싱크로 기록됩니다. 런타임 밖에서 호출하면
    /// 실패로 기록되고 `None`을 반환합니다.
    pub fn log_async<R: Into<LogRequest>>(&self, request: R) -> Option<JoinHandle<()>> {
        let request = request.into();
        let label = format!("{}(async)", current_thread_label());

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let shared = self.pipeline.clone();
                Some(handle.spawn(async move {
                    with_thread_label(label, || {
                        shared.read().log(request, Submission::Direct);
                    });
                }))
            }
            Err(_) => {
                self.pipeline.read().handle_failure(LogError::NoRuntime);
                None
            }
        }
    }

    /// 대기 배치에 추가하여 `force_log_interval`마다 한꺼번에 기록
    pub fn log_buffered<R: Into<LogRequest>>(&self, request: R) {
        self.pipeline.read().log(request.into(), Submission::Buffered);
    }

    /// 빈 줄 기록 (심각도와 무관, 비활성 상태면 무시)
    pub fn log_new_line(&self) {
        self.pipeline.read().log_new_line();
    }

    pub fn debug<S: Into<String>>(&self, message: S) {
        self.log(LogRequest::new(message).severity(LogSeverity::Debug));
    }

    pub fn info<S: Into<String>>(&self, message: S) {
        self.log(LogRequest::new(message).severity(LogSeverity::Info));
    }

    pub fn warn<S: Into<String>>(&self, message: S) {
        self.log(LogRequest::new(message).severity(LogSeverity::Warn));
    }

    pub fn error<S: Into<String>>(&self, message: S) {
        self.log(LogRequest::new(message).severity(LogSeverity::Error));
    }

    pub fn fatal<S: Into<String>>(&self, message: S) {
        self.log(LogRequest::new(message).severity(LogSeverity::Fatal));
    }

    pub fn pass<S: Into<String>>(&self, message: S) {
        self.log(LogRequest::new(message).severity(LogSeverity::Pass));
    }

    pub fn fail<S: Into<String>>(&self, message: S) {
        self.log(LogRequest::new(message).severity(LogSeverity::Fail));
    }

    /// 로깅 레벨 변경
    ///
    /// 변경 사실을 이전 레벨 기준으로 먼저 기록한 뒤 적용하고, 활성 여부가
    /// 바뀌면 "Logging enabled"/"Logging disabled"를 추가로 기록합니다.
    pub fn set_logging_level<L: Into<LoggingLevel>>(&self, level: L) {
        self.pipeline.read().set_logging_level(level.into());
    }

    pub fn logging_level(&self) -> LoggingLevel {
        self.current().state().level
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging_level().is_enabled()
    }

    pub fn default_write_out(&self) -> bool {
        self.current().state().default_write_out
    }

    pub fn set_default_write_out(&self, write_out: bool) {
        self.current().state.write().default_write_out = write_out;
    }

    pub fn log_milliseconds(&self) -> bool {
        self.current().state().log_milliseconds
    }

    pub fn force_log_interval(&self) -> Duration {
        self.current().state().force_log_interval
    }

    /// 지금까지 디스패치된 명령 수
    pub fn dispatched(&self) -> u64 {
        self.current().sequence.load(Ordering::SeqCst)
    }

    /// 현재 싱크
    pub fn sink(&self) -> Arc<dyn LogSink> {
        self.current().sink.clone()
    }

    /// 지금까지 디스패치된 항목(대기 배치 포함)이 싱크에 전달될 때까지 대기
    ///
    /// 아직 실행되지 않은 `log_async` 태스크는 포함하지 않습니다.
    pub async fn flush(&self) -> crate::error::Result<()> {
        self.current().flush().await
    }

    /// 남은 항목을 모두 기록하고 작성기 종료
    pub async fn shutdown(self) -> crate::error::Result<()> {
        let pipeline = self.current();
        pipeline.stop().await?;
        info!("로그 코디네이터 종료됨");
        Ok(())
    }
}
