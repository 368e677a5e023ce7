//! 写真の表示URL管理
//!
//! - RemoteAssetResolver: 保存済みファイル名 → 取得URL
//! - ObjectUrlRegistry: 未アップロード写真のローカルプレビューURLの発行と失効

use crate::error::{ChecklistError, Result};
use inspection_common::{PhotoItem, PhotoSource};
use reqwest::Url;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// 保存済み写真のURLを組み立てる
#[derive(Debug, Clone)]
pub struct RemoteAssetResolver {
    base: Url,
}

impl RemoteAssetResolver {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| ChecklistError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        Ok(Self { base })
    }

    /// `<base>?filename=<エンコード済みファイル名>`
    pub fn resolve(&self, filename: &str) -> String {
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair("filename", filename);
        url.to_string()
    }

    /// 表示用URL（ローカルソースはそのまま、ファイル名のみならリモートURL）
    pub fn display_url(&self, photo: &PhotoItem) -> String {
        match &photo.source {
            Some(source) => source.url().to_string(),
            None => self.resolve(&photo.filename),
        }
    }

    /// ソースのない写真をリモートソースで補完
    pub fn hydrate(&self, photo: &mut PhotoItem) -> bool {
        if photo.source.is_some() {
            return false;
        }
        photo.source = Some(PhotoSource::Remote(self.resolve(&photo.filename)));
        true
    }
}

/// ローカルプレビューURLの発行元
///
/// ブラウザでは `URL.createObjectURL` / `URL.revokeObjectURL` に相当する。
pub trait ObjectUrlRegistry: Send + Sync {
    fn create(&self, bytes: &[u8], mime: &str) -> String;
    fn revoke(&self, url: &str);
    /// このセッションで発行済みかつ未失効か
    fn is_live(&self, url: &str) -> bool;
}

/// メモリ上のプレビューURL管理
#[derive(Debug, Default)]
pub struct LocalUrlRegistry {
    inner: Mutex<LocalUrls>,
}

#[derive(Debug, Default)]
struct LocalUrls {
    next_id: u64,
    live: BTreeMap<String, usize>,
}

impl LocalUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 失効していないURL
    pub fn live_handles(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.live.keys().cloned().collect()
    }
}

impl ObjectUrlRegistry for LocalUrlRegistry {
    fn create(&self, bytes: &[u8], mime: &str) -> String {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.next_id += 1;
        let url = format!("blob:local/{}/{}", mime, inner.next_id);
        inner.live.insert(url.clone(), bytes.len());
        tracing::debug!(url = %url, size = bytes.len(), "preview handle created");
        url
    }

    fn revoke(&self, url: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.live.remove(url).is_some() {
            tracing::debug!(url = %url, "preview handle revoked");
        }
    }

    fn is_live(&self, url: &str) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.live.contains_key(url)
    }
}
