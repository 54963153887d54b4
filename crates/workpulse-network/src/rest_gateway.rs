//! REST 영속화 게이트웨이.
//!
//! `PersistenceGateway` 포트 구현. 호스팅 백엔드의 PostgREST 엔드포인트 사용:
//! - 테이블: `/rest/v1/user_sessions`, `/rest/v1/user_inactivity`
//! - 함수: `/rest/v1/rpc/upsert_daily_activity`, `/rest/v1/rpc/session_active_minutes`
//!
//! 쓰기 요청은 재시도하지 않는다 (실패는 호출 측에서 기록만 함).
//! 조회 요청만 지수 백오프로 재시도한다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use workpulse_core::config::BackendConfig;
use workpulse_core::error::CoreError;
use workpulse_core::models::session::{DeviceInfo, SessionStatus};
use workpulse_core::models::summary::SummaryUpdate;
use workpulse_core::ports::gateway::PersistenceGateway;

use crate::response::{check_response, is_retryable};

/// 조회 요청 기본 재시도 횟수
const DEFAULT_MAX_RETRIES: u32 = 2;

const SESSIONS_PATH: &str = "/rest/v1/user_sessions";
const INACTIVITY_PATH: &str = "/rest/v1/user_inactivity";
const UPSERT_SUMMARY_RPC: &str = "/rest/v1/rpc/upsert_daily_activity";
const ACTIVE_MINUTES_RPC: &str = "/rest/v1/rpc/session_active_minutes";

#[derive(Debug, Deserialize)]
struct IdRow {
    id: String,
}

/// 백엔드 REST 게이트웨이
pub struct RestGateway {
    client: reqwest::Client,
    /// 종료 알림 전용 (짧은 제한 시간)
    beacon_client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl RestGateway {
    /// 백엔드 설정으로 생성
    pub fn new(config: &BackendConfig) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;
        let beacon_client = reqwest::Client::builder()
            .timeout(config.beacon_timeout())
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            beacon_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// 조회 재시도 횟수 설정
    #[cfg(test)]
    pub(crate) fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn url(&self, path: &str, filters: &[(&str, String)]) -> Result<reqwest::Url, CoreError> {
        let mut url = reqwest::Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| CoreError::Config(format!("잘못된 백엔드 URL: {e}")))?;
        if !filters.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in filters {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// apikey + Bearer 헤더가 포함된 요청 빌더
    fn request(
        &self,
        client: &reqwest::Client,
        method: reqwest::Method,
        url: reqwest::Url,
    ) -> reqwest::RequestBuilder {
        client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// 행을 삽입하고 할당된 ID 반환
    async fn insert_returning_id(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<String, CoreError> {
        let url = self.url(path, &[])?;
        let resp = self
            .request(&self.client, reqwest::Method::POST, url)
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("삽입 요청 실패 ({path}): {e}")))?;

        let rows: Vec<IdRow> = check_response(resp)
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Internal(format!("응답 파싱 실패 ({path}): {e}")))?;

        rows.into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| CoreError::Internal(format!("삽입 응답에 행이 없음 ({path})")))
    }

    async fn patch(
        &self,
        client: &reqwest::Client,
        path: &str,
        filters: &[(&str, String)],
        body: serde_json::Value,
    ) -> Result<(), CoreError> {
        let url = self.url(path, filters)?;
        let resp = self
            .request(client, reqwest::Method::PATCH, url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("갱신 요청 실패 ({path}): {e}")))?;
        check_response(resp).await?;
        Ok(())
    }

    async fn rpc(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response, CoreError> {
        let url = self.url(path, &[])?;
        let resp = self
            .request(&self.client, reqwest::Method::POST, url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("RPC 요청 실패 ({path}): {e}")))?;
        check_response(resp).await
    }

    /// 재시도가 포함된 조회 실행
    ///
    /// 1s → 2s → 4s (최대 30s), RateLimit은 서버 지정 대기 시간 사용
    async fn read_with_retry<F, Fut, T>(&self, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut delay = Duration::from_secs(1);
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if !is_retryable(&e) || attempt >= self.max_retries => return Err(e),
                Err(e) => {
                    attempt += 1;
                    warn!(
                        "조회 실패 (시도 {}/{}): {e}, {delay:?} 후 재시도",
                        attempt,
                        self.max_retries + 1
                    );
                    if let CoreError::RateLimit { retry_after_secs } = &e {
                        delay = Duration::from_secs(*retry_after_secs);
                    }
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(30));
                }
            }
        }
    }
}

#[async_trait]
impl PersistenceGateway for RestGateway {
    async fn create_session(&self, user_id: &str, device: &DeviceInfo) -> Result<String, CoreError> {
        debug!("세션 생성 요청: user_id={user_id}");
        let id = self
            .insert_returning_id(
                SESSIONS_PATH,
                json!({
                    "user_id": user_id,
                    "status": SessionStatus::Active.as_str(),
                    "user_agent": device.user_agent,
                    "platform": device.platform,
                }),
            )
            .await?;
        debug!("세션 생성 성공: session_id={id}");
        Ok(id)
    }

    async fn find_open_session(&self, user_id: &str) -> Result<Option<String>, CoreError> {
        self.read_with_retry(|| async {
            let url = self.url(
                SESSIONS_PATH,
                &[
                    ("select", "id".to_string()),
                    ("user_id", format!("eq.{user_id}")),
                    ("ended_at", "is.null".to_string()),
                    ("order", "started_at.desc".to_string()),
                    ("limit", "1".to_string()),
                ],
            )?;
            let resp = self
                .request(&self.client, reqwest::Method::GET, url)
                .send()
                .await
                .map_err(|e| CoreError::Network(format!("열린 세션 조회 실패: {e}")))?;
            let rows: Vec<IdRow> = check_response(resp)
                .await?
                .json()
                .await
                .map_err(|e| CoreError::Internal(format!("세션 응답 파싱 실패: {e}")))?;
            Ok(rows.into_iter().next().map(|row| row.id))
        })
        .await
    }

    async fn close_session(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
        status: SessionStatus,
    ) -> Result<(), CoreError> {
        debug!("세션 종료 요청: session_id={session_id}");
        self.patch(
            &self.client,
            SESSIONS_PATH,
            &[
                ("id", format!("eq.{session_id}")),
                ("ended_at", "is.null".to_string()),
            ],
            json!({ "ended_at": ended_at, "status": status.as_str() }),
        )
        .await
    }

    async fn open_inactivity_interval(
        &self,
        session_id: &str,
        user_id: &str,
        start_idle: DateTime<Utc>,
    ) -> Result<String, CoreError> {
        self.insert_returning_id(
            INACTIVITY_PATH,
            json!({
                "session_id": session_id,
                "user_id": user_id,
                "start_idle": start_idle,
            }),
        )
        .await
    }

    async fn close_inactivity_interval(
        &self,
        interval_id: &str,
        end_idle: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Result<(), CoreError> {
        self.patch(
            &self.client,
            INACTIVITY_PATH,
            &[
                ("id", format!("eq.{interval_id}")),
                ("end_idle", "is.null".to_string()),
            ],
            json!({ "end_idle": end_idle, "duration_minutes": duration_minutes }),
        )
        .await
    }

    async fn upsert_daily_summary(&self, update: &SummaryUpdate) -> Result<(), CoreError> {
        self.rpc(
            UPSERT_SUMMARY_RPC,
            json!({
                "p_user_id": update.user_id,
                "p_date": update.date,
                "p_login_at": update.login_at,
                "p_activity_at": update.activity_at,
                "p_active_minutes_delta": update.active_minutes_delta,
                "p_session_count_delta": update.session_count_delta,
            }),
        )
        .await?;
        Ok(())
    }

    async fn compute_active_minutes(&self, session_id: &str) -> Result<u32, CoreError> {
        self.read_with_retry(|| async {
            let minutes: i64 = self
                .rpc(ACTIVE_MINUTES_RPC, json!({ "p_session_id": session_id }))
                .await?
                .json()
                .await
                .map_err(|e| CoreError::Internal(format!("활동 시간 파싱 실패: {e}")))?;
            Ok(u32::try_from(minutes.max(0)).unwrap_or(u32::MAX))
        })
        .await
    }

    async fn notify_session_end(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        debug!("종료 알림: session_id={session_id}");
        self.patch(
            &self.beacon_client,
            SESSIONS_PATH,
            &[
                ("id", format!("eq.{session_id}")),
                ("ended_at", "is.null".to_string()),
            ],
            json!({
                "ended_at": ended_at,
                "status": SessionStatus::LoggedOut.as_str(),
            }),
        )
        .await
    }
}
