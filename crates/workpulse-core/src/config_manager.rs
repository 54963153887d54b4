//! 설정 파일 관리.
//!
//! 플랫폼별 설정 디렉토리에 JSON 파일로 설정을 저장/로드한다.

use crate::config::AppConfig;
use crate::error::CoreError;
use directories::ProjectDirs;
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CONFIG_FILE_NAME: &str = "config.json";

/// 설정 관리자
///
/// 파일 로드/저장과 런타임 설정 변경을 담당. 복제본은 같은 설정을 공유한다.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
    config_path: PathBuf,
}

impl ConfigManager {
    /// 기본 경로에서 설정 로드 (없으면 기본값으로 생성)
    pub fn new() -> Result<Self, CoreError> {
        let config_path = Self::config_dir()?.join(CONFIG_FILE_NAME);
        Self::with_path(config_path)
    }

    /// 지정된 경로로 설정 관리자 생성
    pub fn with_path(config_path: PathBuf) -> Result<Self, CoreError> {
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    CoreError::Config(format!(
                        "설정 디렉토리 생성 실패: {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
                info!("설정 디렉토리 생성: {}", parent.display());
            }
        }

        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            let default_config = AppConfig::default_config();
            Self::save_to_file(&config_path, &default_config)?;
            info!("기본 설정 파일 생성: {}", config_path.display());
            default_config
        };

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// 현재 설정 (복제본)
    pub fn get(&self) -> AppConfig {
        self.config.read().clone()
    }

    /// 설정 교체 및 파일 저장
    pub fn update(&self, new_config: AppConfig) -> Result<(), CoreError> {
        new_config.validate()?;
        Self::save_to_file(&self.config_path, &new_config)?;
        *self.config.write() = new_config;
        debug!("설정 저장 완료: {}", self.config_path.display());
        Ok(())
    }

    /// 일부 필드만 변경
    pub fn update_with<F>(&self, updater: F) -> Result<AppConfig, CoreError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.get();
        updater(&mut config);
        self.update(config.clone())?;
        Ok(config)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 파일에서 다시 로드
    pub fn reload(&self) -> Result<(), CoreError> {
        let config = Self::load_from_file(&self.config_path)?;
        *self.config.write() = config;
        info!("설정 다시 로드 완료");
        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs, CoreError> {
        ProjectDirs::from("com", "workpulse", "tracker")
            .ok_or_else(|| CoreError::Config("홈 디렉토리를 찾을 수 없습니다".to_string()))
    }

    /// 플랫폼별 설정 디렉토리
    pub fn config_dir() -> Result<PathBuf, CoreError> {
        Ok(Self::project_dirs()?.config_dir().to_path_buf())
    }

    /// 플랫폼별 데이터 디렉토리 (SQLite DB)
    pub fn data_dir() -> Result<PathBuf, CoreError> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    fn load_from_file(path: &Path) -> Result<AppConfig, CoreError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("설정 파일 읽기 실패: {}: {}", path.display(), e))
        })?;

        let config: AppConfig = serde_json::from_str(&content).map_err(|e| {
            CoreError::Config(format!("설정 파일 파싱 실패: {}: {}", path.display(), e))
        })?;
        config.validate()?;

        debug!("설정 파일 로드 완료: {}", path.display());
        Ok(config)
    }

    fn save_to_file(path: &Path, config: &AppConfig) -> Result<(), CoreError> {
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content).map_err(|e| {
            CoreError::Config(format!("설정 파일 저장 실패: {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_default_file_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let manager = ConfigManager::with_path(config_path.clone()).unwrap();
        assert!(config_path.exists());
        assert_eq!(manager.get().tracker.warning_after_secs, 300);
    }

    #[test]
    fn update_persists_across_managers() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let manager = ConfigManager::with_path(config_path.clone()).unwrap();
        manager
            .update_with(|c| {
                c.tracker.heartbeat_interval_secs = 120;
                c.summary.utc_offset_minutes = 540;
            })
            .unwrap();

        let config = ConfigManager::with_path(config_path).unwrap().get();
        assert_eq!(config.tracker.heartbeat_interval_secs, 120);
        assert_eq!(config.summary.utc_offset_minutes, 540);
    }

    #[test]
    fn invalid_update_rejected_and_not_saved() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let manager = ConfigManager::with_path(config_path.clone()).unwrap();

        let result = manager.update_with(|c| c.tracker.reminder2_after_secs = 1);
        assert!(result.is_err());
        assert_eq!(manager.get().tracker.reminder2_after_secs, 3_600);

        let reloaded = ConfigManager::with_path(config_path).unwrap().get();
        assert_eq!(reloaded.tracker.reminder2_after_secs, 3_600);
    }

    #[test]
    fn reload_picks_up_file_changes() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let manager = ConfigManager::with_path(config_path.clone()).unwrap();

        let mut config = manager.get();
        config.backend.base_url = "https://example.test".to_string();
        fs::write(&config_path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        manager.reload().unwrap();
        assert!(manager.get().backend.is_remote());
    }

    #[test]
    fn malformed_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, "{ not json").unwrap();

        let result = ConfigManager::with_path(config_path);
        assert!(matches!(result, Err(CoreError::Config(_))));
    }
}
