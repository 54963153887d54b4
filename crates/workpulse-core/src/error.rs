//! WorkPulse 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 자체 에러 타입에서 `#[from] CoreError`로 래핑한다.

use thiserror::Error;

/// 코어 레이어 에러.
/// 직렬화, 설정, 유효성 검증, 영속화 게이트웨이 에러를 정의한다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패 ({field}): {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 인증 실패 (토큰 만료, API 키 오류 등)
    #[error("인증 에러: {0}")]
    Auth(String),

    /// 리소스를 찾을 수 없음
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "Session", "InactivityInterval")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// 네트워크 에러 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// Rate Limit 초과 (429)
    #[error("요청 한도 초과, {retry_after_secs}초 후 재시도")]
    RateLimit {
        /// 재시도 대기 시간 (초)
        retry_after_secs: u64,
    },

    /// 서비스 일시 불가 (503)
    #[error("서비스 일시 불가: {0}")]
    ServiceUnavailable(String),

    /// 현재 상태에서 허용되지 않는 전이
    #[error("잘못된 상태: {0}")]
    InvalidState(String),

    /// 상호작용 이벤트 구독 불가 (리스너 연결 실패)
    #[error("상호작용 리스너 사용 불가: {0}")]
    ListenerUnavailable(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}
