//! 응답 상태 코드 → `CoreError` 매핑.

use tracing::warn;
use workpulse_core::error::CoreError;

/// Retry-After 헤더가 없을 때 대기 시간
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// 성공 응답은 그대로, 실패 응답은 상태 코드별 에러로 변환
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, CoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let retry_after = retry_after_secs(&resp);
    let text = resp.text().await.unwrap_or_else(|e| {
        warn!("응답 본문 읽기 실패: {e}");
        String::new()
    });

    Err(map_status(status.as_u16(), text, retry_after))
}

/// 재시도 가능한 에러인지 판별
pub fn is_retryable(error: &CoreError) -> bool {
    matches!(
        error,
        CoreError::Network(_) | CoreError::ServiceUnavailable(_) | CoreError::RateLimit { .. }
    )
}

fn retry_after_secs(resp: &reqwest::Response) -> u64 {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

fn map_status(status: u16, text: String, retry_after_secs: u64) -> CoreError {
    match status {
        400 | 422 => CoreError::Validation {
            field: "request".to_string(),
            message: text,
        },
        401 | 403 => CoreError::Auth(format!("인증 실패: {text}")),
        404 => CoreError::NotFound {
            resource_type: "API".to_string(),
            id: text,
        },
        409 => CoreError::InvalidState(format!("충돌: {text}")),
        429 => CoreError::RateLimit { retry_after_secs },
        502..=504 => CoreError::ServiceUnavailable(text),
        _ => CoreError::Internal(format!("API 에러 ({status}): {text}")),
    }
}
