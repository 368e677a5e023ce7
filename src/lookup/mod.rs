//! 様式区分の照会
//!
//! 設備IDから様式区分トークンを取得する外部サービスの抽象。

mod http;

pub use http::HttpClassificationLookup;

use crate::error::{ChecklistError, Result};
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait ClassificationLookup: Send + Sync {
    /// 設備IDの様式区分トークン（未登録なら None）
    async fn form_type(&self, equipment_id: &str) -> Result<Option<String>>;
}

#[async_trait]
impl ClassificationLookup for Box<dyn ClassificationLookup> {
    async fn form_type(&self, equipment_id: &str) -> Result<Option<String>> {
        (**self).form_type(equipment_id).await
    }
}

/// メモリ上の対応表による照会
#[derive(Debug, Clone, Default)]
pub struct StaticClassificationLookup {
    entries: HashMap<String, String>,
    /// 全設備に共通のトークン（CLIの `--form-type` 用）
    fallback: Option<String>,
}

impl StaticClassificationLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, equipment_id: impl Into<String>, form_type: impl Into<String>) -> Self {
        self.entries.insert(equipment_id.into(), form_type.into());
        self
    }

    pub fn uniform(form_type: impl Into<String>) -> Self {
        Self { entries: HashMap::new(), fallback: Some(form_type.into()) }
    }
}

#[async_trait]
impl ClassificationLookup for StaticClassificationLookup {
    async fn form_type(&self, equipment_id: &str) -> Result<Option<String>> {
        Ok(self.entries.get(equipment_id).cloned().or_else(|| self.fallback.clone()))
    }
}

/// 照会先が未設定の場合（常に失敗し、1回次に倒れる）
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClassification;

#[async_trait]
impl ClassificationLookup for NoClassification {
    async fn form_type(&self, _equipment_id: &str) -> Result<Option<String>> {
        Err(ChecklistError::Lookup("照会先が設定されていません".into()))
    }
}
