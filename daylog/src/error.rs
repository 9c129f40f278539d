//! 로깅 파이프라인 에러 정의
//!
//! 싱크 계약(`LogSink`)과 코디네이터가 주고받는 모든 실패를 표현합니다.
//! 설정/초기화 경로는 `anyhow::Result`를 사용하고, 파이프라인 내부 경로는
//! 이 타입을 사용합니다.

use std::error::Error as _;
use std::path::PathBuf;
use thiserror::Error;

/// 로깅 파이프라인 에러
#[derive(Error, Debug)]
pub enum LogError {
    /// 경합이 아닌 파일 I/O 실패 (재시도하지 않음)
    #[error("로그 파일 I/O 실패 ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 제한된 재시도 정책을 모두 소진함
    #[error("로그 파일 쓰기 재시도 {attempts}회 모두 실패 ({})", .path.display())]
    RetryExhausted {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    /// 작성기 태스크가 이미 종료되어 명령을 받을 수 없음
    #[error("로그 작성기 채널이 닫힘")]
    ChannelClosed,

    /// 비동기 작업을 예약할 tokio 런타임이 없음
    #[error("tokio 런타임 컨텍스트 밖에서 비동기 로깅 요청")]
    NoRuntime,

    /// 싱크 구현체가 보고한 임의의 실패
    #[error("싱크 실패: {0}")]
    Sink(String),

    /// 작성기 태스크가 비정상 종료됨
    #[error("로그 작성기 태스크 실패: {0}")]
    Task(String),

    #[error("설정 오류: {0}")]
    Config(String),
}

impl LogError {
    /// 에러 메시지와 `source()` 체인 전체를 한 줄로 반환
    ///
    /// CRASH.log 에 기록되는 `{fullErrorText}` 입니다.
    pub fn full_text(&self) -> String {
        let mut text = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            text.push_str(" <- ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        text
    }
}

pub type Result<T> = std::result::Result<T, LogError>;
