//! I/O 경합 재시도 정책
//!
//! 다른 작성자가 같은 날짜 파일을 잡고 있을 때 쓰기 전체를 다시 시도합니다.
//! 기본값은 무제한 재시도이며, 시간 제한이 필요한 호출자는 `limited`를 쓰거나
//! 싱크를 감싸야 합니다.
//!
//! 경합으로 볼 수 있는 에러(`is_contention`)만 재시도합니다. 권한 거부, 디스크
//! 부족, 경로 오류 같은 영구 에러는 즉시 `LogError::Io`로 반환되어 크래시 로그
//! 경로로 넘어갑니다. 따라서 쓰기 도중 실패한 시도가 다시 실행되는 경우는 경합
//! 에러뿐이며, 부분 쓰기 뒤 경합 에러가 나면 그 조각이 중복될 수 있습니다.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::LogError;

#[cfg(unix)]
const EBUSY: i32 = 16;
#[cfg(windows)]
const ERROR_SHARING_VIOLATION: i32 = 32;
#[cfg(windows)]
const ERROR_LOCK_VIOLATION: i32 = 33;

/// 다른 작성자와의 일시적 경합으로 볼 수 있는 에러인지
pub fn is_contention(error: &io::Error) -> bool {
    if matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    ) {
        return true;
    }

    match error.raw_os_error() {
        #[cfg(unix)]
        Some(EBUSY) => true,
        #[cfg(windows)]
        Some(ERROR_SHARING_VIOLATION) | Some(ERROR_LOCK_VIOLATION) => true,
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (`None`이면 무제한)
    pub max_attempts: Option<u32>,
    /// 첫 재시도 전 대기 시간
    pub delay: Duration,
    /// 재시도마다 대기 시간에 곱할 배수
    pub backoff: f64,
    /// 대기 시간 상한
    pub max_delay: Duration,
    /// 추가 지터 상한 (밀리초)
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl RetryPolicy {
    /// 성공할 때까지 고정 간격으로 재시도
    pub fn unbounded() -> Self {
        Self {
            max_attempts: None,
            delay: Duration::from_millis(10),
            backoff: 1.0,
            max_delay: Duration::from_millis(10),
            jitter_ms: 0,
        }
    }

    /// 최대 `attempts`회 시도
    pub fn limited(attempts: u32) -> Self {
        Self {
            max_attempts: Some(attempts),
            ..Self::unbounded()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self.max_delay = self.max_delay.max(delay);
        self
    }

    pub fn with_backoff(mut self, backoff: f64, max_delay: Duration) -> Self {
        self.backoff = backoff;
        self.max_delay = max_delay;
        self
    }

    /// 정책 유효성 검증
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == Some(0) {
            return Err(anyhow::anyhow!("retry max_attempts must be greater than 0"));
        }

        if !(self.backoff >= 1.0) {
            return Err(anyhow::anyhow!("retry backoff must be at least 1.0"));
        }

        Ok(())
    }

    /// `attempt`번째 실패 뒤 대기 시간
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff.powi(attempt.saturating_sub(1).min(32) as i32);
        let cap = self.max_delay.max(self.delay).as_nanos() as f64;
        let nanos = (self.delay.as_nanos() as f64 * factor).min(cap);
        let base = Duration::from_nanos(nanos.round() as u64);
        if self.jitter_ms == 0 {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0..self.jitter_ms);
        base + Duration::from_millis(jitter)
    }

    /// `operation`을 경합 에러가 나는 동안 정책에 따라 반복 실행
    ///
    /// 경합이 아닌 에러는 재시도 없이 `LogError::Io`로 반환합니다.
    /// `path`는 진단과 에러 보고용입니다.
    pub async fn execute<T, F, Fut>(&self, path: &Path, mut operation: F) -> Result<T, LogError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = io::Result<T>>,
    {
        let mut attempts: u32 = 0;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempts > 0 {
                        debug!(
                            path = %path.display(),
                            retries = attempts,
                            "로그 파일 쓰기 재시도 성공"
                        );
                    }
                    return Ok(value);
                }
                Err(e) if !is_contention(&e) => {
                    debug!(
                        path = %path.display(),
                        error = %e,
                        "경합이 아닌 I/O 에러, 재시도하지 않음"
                    );
                    return Err(LogError::Io {
                        path: path.to_path_buf(),
                        source: e,
                    });
                }
                Err(e) => {
                    attempts = attempts.saturating_add(1);

                    if let Some(max) = self.max_attempts {
                        if attempts >= max {
                            warn!(
                                path = %path.display(),
                                attempts,
                                error = %e,
                                "로그 파일 쓰기 재시도 한도 초과"
                            );
                            return Err(LogError::RetryExhausted {
                                path: path.to_path_buf(),
                                attempts,
                                source: e,
                            });
                        }
                    }

                    debug!(
                        path = %path.display(),
                        attempt = attempts,
                        error = %e,
                        "로그 파일 경합, 재시도"
                    );

                    let delay = self.delay_for(attempts);
                    if delay.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        sleep(delay).await;
                    }
                }
            }
        }
    }
}
