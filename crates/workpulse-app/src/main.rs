//! # workpulse-app
//!
//! WorkPulse 바이너리 진입점.
//! 설정 로드, 게이트웨이 선택(로컬 SQLite 또는 원격 REST), 추적기와 컨트롤러 조립,
//! UI 브리지(stdin) 구동, 시그널 기반 종료를 담당한다.

mod bridge;
mod lifecycle;
mod presenter;

use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use workpulse_core::config::AppConfig;
use workpulse_core::config_manager::ConfigManager;
use workpulse_core::ports::clock::{Clock, SystemClock};
use workpulse_core::ports::gateway::PersistenceGateway;
use workpulse_monitor::controller::SessionLifecycleController;
use workpulse_monitor::listener::BroadcastInteractionSource;
use workpulse_monitor::tracker::{ActivityTracker, TrackerDeps, TrackerSettings};
use workpulse_network::rest_gateway::RestGateway;
use workpulse_storage::sqlite::SqliteStorage;

use crate::bridge::{BridgeExit, UiBridge};
use crate::lifecycle::LifecycleManager;
use crate::presenter::JsonLinesPresenter;

/// WorkPulse 활동 추적기
///
/// stdin으로 UI 신호(JSON Lines)를 받고, stdout으로 상태를 내보낸다.
#[derive(Parser, Debug)]
#[command(name = "workpulse")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 로컬 DB 저장 디렉토리 (기본: 플랫폼 데이터 디렉토리)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// 원격 백엔드 URL (지정 시 REST 게이트웨이 사용)
    #[arg(long, short = 's')]
    backend_url: Option<String>,

    /// 원격 백엔드 API 키
    #[arg(long)]
    api_key: Option<String>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// 시작 시 인증된 사용자 ID
    #[arg(long, short = 'u')]
    user: Option<String>,

    /// 경고 단계 지연 (초)
    #[arg(long)]
    warning_after_secs: Option<u64>,

    /// 1차 리마인더 지연 (초)
    #[arg(long)]
    reminder1_after_secs: Option<u64>,

    /// 2차 리마인더 지연 (초)
    #[arg(long)]
    reminder2_after_secs: Option<u64>,

    /// 종료 시 세션 종료 처리 대기 한도 (밀리초)
    #[arg(long, default_value = "2000")]
    unload_grace_ms: u64,
}

/// CLI 인자로 설정 오버라이드
fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(ref url) = args.backend_url {
        config.backend.base_url = url.clone();
    }
    if let Some(ref key) = args.api_key {
        config.backend.api_key = key.clone();
    }
    if let Some(secs) = args.warning_after_secs {
        config.tracker.warning_after_secs = secs;
    }
    if let Some(secs) = args.reminder1_after_secs {
        config.tracker.reminder1_after_secs = secs;
    }
    if let Some(secs) = args.reminder2_after_secs {
        config.tracker.reminder2_after_secs = secs;
    }
}

/// DB 경로 결정: 설정의 `db_path` > `--data-dir` > 플랫폼 데이터 디렉토리
fn resolve_db_path(config: &AppConfig, data_dir: Option<&Path>) -> PathBuf {
    if let Some(ref path) = config.storage.db_path {
        return path.clone();
    }
    data_dir
        .map(Path::to_path_buf)
        .or_else(|| ConfigManager::data_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
        .join(&config.storage.db_file_name)
}

/// 게이트웨이 선택
///
/// 백엔드 URL이 있으면 REST, 없으면 로컬 SQLite (시작 시 만료 세션 정리).
fn build_gateway(
    config: &AppConfig,
    data_dir: Option<&Path>,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn PersistenceGateway>> {
    if config.backend.is_remote() {
        info!("원격 백엔드: {}", config.backend.base_url);
        return Ok(Arc::new(RestGateway::new(&config.backend)?));
    }

    let db_path = resolve_db_path(config, data_dir);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow!("데이터 디렉토리 생성 실패 {}: {e}", parent.display()))?;
    }
    let storage = SqliteStorage::open(&db_path, config.summary.clone())?.with_clock(clock);

    let cutoff = Utc::now() - chrono::Duration::hours(i64::from(config.storage.stale_session_hours));
    match storage.expire_stale_sessions(cutoff) {
        Ok(0) => {}
        Ok(count) => info!("이전 실행에서 남은 세션 {count}개 만료 처리"),
        Err(e) => warn!("만료 세션 정리 실패: {e}"),
    }

    Ok(Arc::new(storage))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout은 UI 메시지 전용, 로그는 stderr
    let log_filter = format!(
        "workpulse={0},workpulse_app={0},workpulse_core={0},workpulse_monitor={0},workpulse_storage={0},workpulse_network={0}",
        args.log_level
    );
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    info!("WorkPulse 시작");

    let config_manager = match args.config.clone() {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    }
    .map_err(|e| anyhow!("설정 관리자 초기화 실패: {e}"))?;
    info!("설정 파일: {}", config_manager.config_path().display());

    let mut config = config_manager.get();
    apply_overrides(&mut config, &args);
    config
        .validate()
        .map_err(|e| anyhow!("설정 검증 실패: {e}"))?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let gateway = build_gateway(&config, args.data_dir.as_deref(), clock.clone())?;

    // ── 추적기 ──
    let source = BroadcastInteractionSource::default();
    let deps = TrackerDeps {
        gateway: gateway.clone(),
        presenter: Arc::new(JsonLinesPresenter::stdout()),
        source: source.clone().into_shared(),
        clock,
    };
    let (tracker, tracker_task) = ActivityTracker::spawn(TrackerSettings::from_config(&config), deps);

    // ── 세션 라이프사이클 ──
    let lifecycle = LifecycleManager::new();
    let (auth_tx, auth_rx) = watch::channel(args.user.clone());
    let controller = Arc::new(SessionLifecycleController::new(
        tracker.clone(),
        gateway,
        config.tracker.start_delay(),
    ));
    {
        let controller = controller.clone();
        let shutdown_rx = lifecycle.subscribe();
        tokio::spawn(async move { controller.run(auth_rx, shutdown_rx).await });
    }

    // ── UI 브리지 ──
    let bridge = UiBridge::new(auth_tx, source, tracker.clone());
    let stdin = BufReader::new(tokio::io::stdin());

    tokio::select! {
        exit = bridge.run(stdin, lifecycle.subscribe()) => {
            info!("UI 브리지 종료: {:?}", exit);
            // 사전 인증 모드에서는 입력이 없어도 시그널까지 계속 추적
            if exit == BridgeExit::InputClosed && args.user.is_some() {
                let reason = lifecycle.wait_for_exit().await;
                info!("종료 사유: {:?}", reason);
            }
        }
        reason = lifecycle.wait_for_exit() => info!("종료 사유: {:?}", reason),
    }

    // 페이지 이탈 처리: 종료 알림 후 세션 종료 대기
    controller
        .unload(Duration::from_millis(args.unload_grace_ms))
        .await;

    lifecycle.shutdown();
    tracker.shutdown();
    if let Err(e) = tracker_task.await {
        warn!("추적기 태스크 비정상 종료: {e}");
    }

    info!("WorkPulse 종료");
    Ok(())
}
