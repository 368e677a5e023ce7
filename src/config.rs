use crate::error::{ChecklistError, Result};
use inspection_common::FormTypeTable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const ASSET_BASE_ENV: &str = "INSPECTION_ASSET_BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 保存済み写真を取得するURLのベース
    pub asset_base_url: String,
    /// 様式区分の照会エンドポイント（未設定なら照会しない）
    pub classification_url: Option<String>,
    pub form_type_rounds: FormTypeTable,
    /// 点検データ（JSON）の保存先
    pub report_dir: Option<PathBuf>,
    pub problem_catalog_path: Option<PathBuf>,
    pub legal_catalog_path: Option<PathBuf>,
    pub timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            asset_base_url: "http://localhost:8080/api/defect-photo".into(),
            classification_url: None,
            form_type_rounds: FormTypeTable::default(),
            report_dir: None,
            problem_catalog_path: None,
            legal_catalog_path: None,
            timeout_seconds: 30,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content)?
        } else {
            Self::default()
        };

        // 環境変数を優先
        if let Ok(base) = std::env::var(ASSET_BASE_ENV) {
            config.asset_base_url = base;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ChecklistError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("inspection-checklist").join("config.json"))
    }

    /// 点検データの保存先（未設定なら設定ディレクトリ配下）
    pub fn report_dir(&self) -> Result<PathBuf> {
        match &self.report_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let config_path = Self::config_path()?;
                let base = config_path
                    .parent()
                    .map(|p| p.to_path_buf())
                    .ok_or_else(|| ChecklistError::Config("設定ディレクトリが不正です".into()))?;
                Ok(base.join("reports"))
            }
        }
    }

    pub fn set_asset_base_url(&mut self, url: String) -> Result<()> {
        self.asset_base_url = url;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.classification_url.is_none());
        assert_eq!(config.form_type_rounds.rounds_for(Some("B")).get(), 2);
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"assetBaseUrl": "ignored", "asset_base_url": "https://assets.example/photo"}"#;
        let config: Config = serde_json::from_str(json).expect("デシリアライズ失敗");
        assert_eq!(config.asset_base_url, "https://assets.example/photo");
        assert_eq!(config.timeout_seconds, 30);
    }

    #[test]
    fn test_custom_form_type_table() {
        let json = r#"{"form_type_rounds": {"SIGN": 2, "BLDG": 3}}"#;
        let config: Config = serde_json::from_str(json).expect("デシリアライズ失敗");
        assert_eq!(config.form_type_rounds.rounds_for(Some("BLDG")).get(), 3);
        assert_eq!(config.form_type_rounds.rounds_for(Some("A")).get(), 1);
    }

    #[test]
    fn test_explicit_report_dir() {
        let config = Config { report_dir: Some(PathBuf::from("/tmp/reports")), ..Default::default() };
        assert_eq!(config.report_dir().unwrap(), PathBuf::from("/tmp/reports"));
    }
}
