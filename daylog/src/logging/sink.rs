//! 로그 싱크 계약
//!
//! 코디네이터는 이 트레이트를 통해서만 영속화/출력 백엔드에 접근합니다.
//! 로그 고유의 로직(필터링, 포매팅)은 여기에 없습니다.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{LogError, Result};
use crate::logging::formatter::LogEntry;

/// 플러그형 영속화 백엔드
#[async_trait]
pub trait LogSink: Send + Sync {
    /// 순서를 보존하며 항목들을 영속적으로 추가
    ///
    /// `Ok`를 반환한 뒤에는 항목이 유실되면 안 됩니다.
    async fn persist_batch(&self, entries: Vec<LogEntry>, leading_blank_line: bool) -> Result<()>;

    /// 오늘의 스트림에 빈 줄 하나 추가
    async fn persist_blank_line(&self) -> Result<()>;

    /// 운영자 콘솔로 텍스트 미러링 (실패해도 복구 체인에 포함되지 않음)
    async fn echo_to_operator(&self, text: &str, leading_blank_line: bool);

    /// 기본 경로 실패를 대체 영속 경로에 기록
    async fn record_failure(&self, error: &LogError) -> Result<()>;

    /// 최후의 보고 수단. 절대 실패하거나 패닉하지 않아야 합니다.
    fn record_final_failure(&self, error: &LogError);
}

/// `MemorySink`가 기록한 호출
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Batch {
        entries: Vec<LogEntry>,
        leading_blank_line: bool,
    },
    BlankLine,
    Echo {
        text: String,
        leading_blank_line: bool,
    },
    Failure(String),
    FinalFailure(String),
}

/// 메모리 내 싱크 (테스트/임베딩용)
///
/// 기본 경로와 실패 기록 경로를 각각 강제로 실패시킬 수 있습니다.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SinkEvent>>,
    fail_primary: AtomicBool,
    fail_recording: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 기본 경로(`persist_*`) 실패 여부 설정
    pub fn set_fail_primary(&self, fail: bool) {
        self.fail_primary.store(fail, Ordering::SeqCst);
    }

    /// 실패 기록 경로(`record_failure`) 실패 여부 설정
    pub fn set_fail_recording(&self, fail: bool) {
        self.fail_recording.store(fail, Ordering::SeqCst);
    }

    /// 모든 호출 기록
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().clone()
    }

    /// 영속화된 항목들 (호출 순서대로 평탄화)
    pub fn entries(&self) -> Vec<LogEntry> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Batch { entries, .. } => Some(entries.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// 영속화된 항목들의 메시지
    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|entry| entry.message).collect()
    }

    /// `persist_batch` 호출 횟수
    pub fn batch_count(&self) -> usize {
        self.count(|event| matches!(event, SinkEvent::Batch { .. }))
    }

    pub fn echoes(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Echo { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Failure(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn final_failures(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                SinkEvent::FinalFailure(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn blank_lines(&self) -> usize {
        self.count(|event| matches!(event, SinkEvent::BlankLine))
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn count(&self, predicate: impl Fn(&SinkEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|event| predicate(event)).count()
    }

    fn primary_guard(&self) -> Result<()> {
        if self.fail_primary.load(Ordering::SeqCst) {
            return Err(LogError::Sink("기본 경로 강제 실패".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn persist_batch(&self, entries: Vec<LogEntry>, leading_blank_line: bool) -> Result<()> {
        self.primary_guard()?;
        self.events.lock().push(SinkEvent::Batch {
            entries,
            leading_blank_line,
        });
        Ok(())
    }

    async fn persist_blank_line(&self) -> Result<()> {
        self.primary_guard()?;
        self.events.lock().push(SinkEvent::BlankLine);
        Ok(())
    }

    async fn echo_to_operator(&self, text: &str, leading_blank_line: bool) {
        self.events.lock().push(SinkEvent::Echo {
            text: text.to_string(),
            leading_blank_line,
        });
    }

    async fn record_failure(&self, error: &LogError) -> Result<()> {
        if self.fail_recording.load(Ordering::SeqCst) {
            return Err(LogError::Sink("실패 기록 경로 강제 실패".to_string()));
        }
        self.events.lock().push(SinkEvent::Failure(error.full_text()));
        Ok(())
    }

    fn record_final_failure(&self, error: &LogError) {
        self.events
            .lock()
            .push(SinkEvent::FinalFailure(error.full_text()));
    }
}
