//! 点検データの保存先

use super::ReportKey;
use crate::error::Result;
use async_trait::async_trait;
use inspection_common::ChecklistSnapshot;
use std::path::{Path, PathBuf};

/// 点検データの読み書き（常にチェックリスト全体を単位とする）
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// 保存済みデータ（新規の組み合わせなら None）
    async fn load(&self, key: &ReportKey) -> Result<Option<ChecklistSnapshot>>;

    async fn save(&self, key: &ReportKey, snapshot: &ChecklistSnapshot) -> Result<()>;

    async fn exists(&self, key: &ReportKey) -> Result<bool> {
        Ok(self.load(key).await?.is_some())
    }
}

/// `<dir>/<業務ID>__<設備ID>.json` に保存する
#[derive(Debug, Clone)]
pub struct FileReportRepository {
    dir: PathBuf,
}

impl FileReportRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &ReportKey) -> PathBuf {
        self.dir.join(format!("{}__{}.json", file_safe(&key.job_id), file_safe(&key.equipment_id)))
    }
}

#[async_trait]
impl ReportRepository for FileReportRepository {
    async fn load(&self, key: &ReportKey) -> Result<Option<ChecklistSnapshot>> {
        let path = self.path_for(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.display(), "report loaded");
        Ok(Some(snapshot))
    }

    async fn save(&self, key: &ReportKey, snapshot: &ChecklistSnapshot) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        let content = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&path, content).await?;
        tracing::info!(path = %path.display(), "report saved");
        Ok(())
    }

    async fn exists(&self, key: &ReportKey) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path_for(key)).await?)
    }
}

/// ID をファイル名用にエンコードする
///
/// 英数字と `-` 以外（`_` を含む）は UTF-8 のバイトごとに `_XX` とする。
/// 異なるIDが同じファイル名にならず、区切りの `__` も現れない。
fn file_safe(id: &str) -> String {
    let mut encoded = String::with_capacity(id.len());
    for c in id.chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            encoded.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                encoded.push_str(&format!("_{:02X}", byte));
            }
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use inspection_common::{Checklist, RowId, RowPatch, TableKey};
    use tempfile::tempdir;

    #[test]
    fn test_path_for_sanitizes_ids() {
        let repository = FileReportRepository::new("/tmp/reports");
        let key = ReportKey::new("JOB/2025", "EQ 1");
        assert_eq!(repository.path_for(&key), PathBuf::from("/tmp/reports/JOB_2F2025__EQ_201.json"));

        let key = ReportKey::new("JOB-1", "E");
        assert_eq!(repository.path_for(&key), PathBuf::from("/tmp/reports/JOB-1__E.json"));
    }

    #[test]
    fn test_path_for_distinct_ids_never_collide() {
        let repository = FileReportRepository::new("/tmp/reports");
        let pairs = [
            (ReportKey::new("J/1", "E"), ReportKey::new("J_1", "E")),
            (ReportKey::new("J", "_E"), ReportKey::new("J_", "E")),
            (ReportKey::new("設備", "E"), ReportKey::new("__", "E")),
        ];
        for (a, b) in pairs {
            assert_ne!(repository.path_for(&a), repository.path_for(&b), "{} と {}", a, b);
        }
        assert_eq!(file_safe("J_1"), "J_5F1");
        assert_eq!(file_safe("点"), "_E7_82_B9");
    }

    #[tokio::test]
    async fn test_similar_ids_stored_separately() {
        let dir = tempdir().unwrap();
        let repository = FileReportRepository::new(dir.path());
        let slash = ReportKey::new("J/1", "E");
        let underscore = ReportKey::new("J_1", "E");

        let checklist = Checklist::new()
            .apply_patch(TableKey::Table1, &RowId::table1(1), RowPatch::note("スラッシュ側"))
            .unwrap();
        repository.save(&slash, &checklist.to_snapshot()).await.unwrap();

        assert!(repository.exists(&slash).await.unwrap());
        assert!(!repository.exists(&underscore).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_report_is_none() {
        let dir = tempdir().unwrap();
        let repository = FileReportRepository::new(dir.path());
        let key = ReportKey::new("J1", "E1");
        assert!(repository.load(&key).await.unwrap().is_none());
        assert!(!repository.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let repository = FileReportRepository::new(dir.path().join("nested"));
        let key = ReportKey::new("J1", "E1");

        let checklist = Checklist::new()
            .apply_patch(TableKey::Table1, &RowId::table1(2), RowPatch::note("塗装剥がれ"))
            .unwrap();
        repository.save(&key, &checklist.to_snapshot()).await.unwrap();

        assert!(repository.exists(&key).await.unwrap());
        let loaded = repository.load(&key).await.unwrap().unwrap();
        let rows = loaded.table(TableKey::Table1).unwrap();
        assert_eq!(rows[&RowId::table1(2)].note, "塗装剥がれ");
    }

    #[tokio::test]
    async fn test_broken_file_is_error() {
        let dir = tempdir().unwrap();
        let repository = FileReportRepository::new(dir.path());
        let key = ReportKey::new("J1", "E1");
        std::fs::write(repository.path_for(&key), "{not json").unwrap();
        assert!(repository.load(&key).await.is_err());
    }
}
