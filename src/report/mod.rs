//! 点検票の編集セッション
//!
//! 業務×設備ごとに開き、回次数の解決・保存データの読込・写真ソースの補完を行う。
//! 保存は常にチェックリスト全体を一括で渡す。

mod repository;

pub use repository::{FileReportRepository, ReportRepository};

use crate::assets::{ObjectUrlRegistry, RemoteAssetResolver};
use crate::capture::{CameraDevice, PhotoCapture};
use crate::error::Result;
use crate::lookup::ClassificationLookup;
use crate::rounds::RoundResolver;
use crate::store::ChecklistStore;
use crate::workflow::{DefectEditor, NoteEditor};
use inspection_common::{ChecklistSnapshot, PhotoItem, PhotoSource, RowId, RowPatch, TableKey, VisitKey};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// 業務ID × 設備ID
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportKey {
    pub job_id: String,
    pub equipment_id: String,
}

impl ReportKey {
    pub fn new(job_id: impl Into<String>, equipment_id: impl Into<String>) -> Self {
        Self { job_id: job_id.into(), equipment_id: equipment_id.into() }
    }
}

impl fmt::Display for ReportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.job_id, self.equipment_id)
    }
}

pub struct ReportSession {
    key: ReportKey,
    store: ChecklistStore,
    repository: Arc<dyn ReportRepository>,
    assets: RemoteAssetResolver,
    urls: Arc<dyn ObjectUrlRegistry>,
}

impl ReportSession {
    /// 点検票を開く
    ///
    /// 回次数を解決し、保存データがあればセクション単位でマージする。
    /// ファイル名しか持たない写真と、このセッションで発行していないプレビューURLを
    /// 持つ写真はリモートURLで補完される。
    pub async fn open<L: ClassificationLookup>(
        key: ReportKey,
        rounds: &RoundResolver<L>,
        repository: Arc<dyn ReportRepository>,
        assets: RemoteAssetResolver,
        urls: Arc<dyn ObjectUrlRegistry>,
    ) -> Result<Self> {
        let round_count = rounds.resolve(&key.equipment_id).await;
        let mut store = ChecklistStore::new(round_count);

        if let Some(mut snapshot) = repository.load(&key).await? {
            let resolved = hydrate_photo_sources(&assets, urls.as_ref(), &mut snapshot);
            store.hydrate(snapshot)?;
            tracing::debug!(report = %key, photos = resolved, "photo sources resolved");
        }

        tracing::info!(report = %key, rounds = round_count.get(), "report opened");
        Ok(Self { key, store, repository, assets, urls })
    }

    pub fn key(&self) -> &ReportKey {
        &self.key
    }

    pub fn store(&self) -> &ChecklistStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ChecklistStore {
        &mut self.store
    }

    pub fn assets(&self) -> &RemoteAssetResolver {
        &self.assets
    }

    pub fn defect_editor(&self, table: TableKey, row_id: RowId, visit: VisitKey) -> Result<DefectEditor> {
        DefectEditor::open(&self.store, table, row_id, visit, self.urls.clone())
    }

    pub fn note_editor(&self, table: TableKey, row_id: RowId) -> Result<NoteEditor> {
        NoteEditor::open(&self.store, table, row_id)
    }

    /// このセッションのURL管理を共有する撮影セッション
    pub fn photo_capture(&self, camera: Arc<dyn CameraDevice>) -> PhotoCapture {
        PhotoCapture::new(camera, self.urls.clone(), self.assets.clone())
    }

    /// チェックリスト全体を保存
    ///
    /// プレビューURLはセッション内でしか有効でないため、保存データには
    /// ファイル名だけを残す。
    pub async fn save(&self) -> Result<()> {
        let mut snapshot = self.store.snapshot();
        let stripped = strip_local_previews(&mut snapshot);
        if stripped > 0 {
            tracing::debug!(report = %self.key, photos = stripped, "preview sources left out of saved report");
        }
        self.repository.save(&self.key, &snapshot).await
    }

    /// アップロード済みになった写真をリモート参照へ切り替える
    ///
    /// 不具合リストは回次単位で丸ごと置き換え、不要になったプレビューURLは失効させる。
    /// 切り替えた写真の枚数を返す。
    pub fn reconcile_uploaded(&mut self, filenames: &[String]) -> Result<usize> {
        let uploaded: HashSet<&str> = filenames.iter().map(|f| f.as_str()).collect();
        let mut patches = Vec::new();
        let mut switched = 0;

        for table in TableKey::ALL {
            for (row_id, row) in self.store.checklist().table(table).iter() {
                for (visit, defects) in &row.defects_by_visit {
                    let mut changed = false;
                    let mut next = defects.clone();
                    for photo in next.iter_mut().flat_map(|d| d.photos.iter_mut()) {
                        if !uploaded.contains(photo.filename.as_str()) {
                            continue;
                        }
                        if matches!(photo.source, Some(PhotoSource::Remote(_))) {
                            continue;
                        }
                        if let Some(url) = photo.local_preview_url() {
                            self.urls.revoke(url);
                        }
                        photo.source = Some(PhotoSource::Remote(self.assets.resolve(&photo.filename)));
                        changed = true;
                        switched += 1;
                    }
                    if changed {
                        patches.push((table, row_id.clone(), RowPatch::defects(*visit, next)));
                    }
                }
            }
        }

        for (table, row_id, patch) in patches {
            self.store.apply(table, &row_id, patch)?;
        }
        if switched > 0 {
            tracing::info!(report = %self.key, photos = switched, "uploaded photos reconciled");
        }
        Ok(switched)
    }
}

fn photos_mut(snapshot: &mut ChecklistSnapshot) -> impl Iterator<Item = &mut PhotoItem> {
    [snapshot.table1.as_mut(), snapshot.table2.as_mut()]
        .into_iter()
        .flatten()
        .flat_map(|rows| rows.values_mut())
        .flat_map(|row| row.defects_by_visit.values_mut())
        .flat_map(|defects| defects.iter_mut())
        .flat_map(|defect| defect.photos.iter_mut())
}

/// 写真ソースをリモートURLで補完（補完した枚数を返す）
///
/// 失効済み・他セッションのプレビューURLは捨ててファイル名から引き直す。
fn hydrate_photo_sources(
    assets: &RemoteAssetResolver,
    urls: &dyn ObjectUrlRegistry,
    snapshot: &mut ChecklistSnapshot,
) -> usize {
    photos_mut(snapshot)
        .map(|photo| {
            if photo.local_preview_url().is_some_and(|url| !urls.is_live(url)) {
                photo.source = None;
            }
            assets.hydrate(photo)
        })
        .filter(|resolved| *resolved)
        .count()
}

/// プレビューURLのソースを外す（外した枚数を返す）
fn strip_local_previews(snapshot: &mut ChecklistSnapshot) -> usize {
    let mut stripped = 0;
    for photo in photos_mut(snapshot) {
        if photo.local_preview_url().is_some() {
            photo.source = None;
            stripped += 1;
        }
    }
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::LocalUrlRegistry;
    use crate::lookup::StaticClassificationLookup;
    use inspection_common::{ChecklistRow, Defect, FormTypeTable};
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn assets() -> RemoteAssetResolver {
        RemoteAssetResolver::new("https://assets.example/photo").unwrap()
    }

    fn resolver(token: &str) -> RoundResolver<StaticClassificationLookup> {
        RoundResolver::new(StaticClassificationLookup::uniform(token), FormTypeTable::default())
    }

    fn snapshot_with_photo(photo: PhotoItem) -> ChecklistSnapshot {
        let mut defect = Defect::from_catalog("P1", "P1", "Fix P1");
        defect.photos.push(photo);
        let mut row = ChecklistRow::default();
        row.defects_by_visit.insert(VisitKey::V1, vec![defect]);
        let mut rows = BTreeMap::new();
        rows.insert(RowId::table1(1), row);
        ChecklistSnapshot { table1: Some(rows), table2: None }
    }

    fn push_photo(snapshot: &mut ChecklistSnapshot, photo: PhotoItem) {
        let rows = snapshot.table1.get_or_insert_with(BTreeMap::new);
        let row = rows.entry(RowId::table1(1)).or_default();
        row.defects_by_visit.entry(VisitKey::V1).or_default()[0].photos.push(photo);
    }

    #[test]
    fn test_hydrate_photo_sources() {
        let mut snapshot = snapshot_with_photo(PhotoItem { filename: "defect_01022025093000.jpg".into(), source: None });
        assert_eq!(hydrate_photo_sources(&assets(), &LocalUrlRegistry::new(), &mut snapshot), 1);
        let rows = snapshot.table1.unwrap();
        let photo = &rows[&RowId::table1(1)].defects(VisitKey::V1)[0].photos[0];
        assert_eq!(
            photo.source,
            Some(PhotoSource::Remote("https://assets.example/photo?filename=defect_01022025093000.jpg".into()))
        );
    }

    #[test]
    fn test_hydrate_replaces_dead_preview() {
        let urls = LocalUrlRegistry::new();
        let live = urls.create(&[1], "image/png");
        let mut snapshot = snapshot_with_photo(PhotoItem::new("a.png", PhotoSource::LocalPreview("blob:local/image/png/9".into())));
        push_photo(&mut snapshot, PhotoItem::new("b.png", PhotoSource::LocalPreview(live.clone())));

        assert_eq!(hydrate_photo_sources(&assets(), &urls, &mut snapshot), 1);
        let rows = snapshot.table1.unwrap();
        let photos = &rows[&RowId::table1(1)].defects(VisitKey::V1)[0].photos;
        assert_eq!(photos[0].source, Some(PhotoSource::Remote("https://assets.example/photo?filename=a.png".into())));
        // このセッションで発行したURLはそのまま
        assert_eq!(photos[1].source, Some(PhotoSource::LocalPreview(live)));
    }

    #[tokio::test]
    async fn test_save_leaves_out_preview_urls() {
        let urls = Arc::new(LocalUrlRegistry::new());
        let preview = urls.create(&[1, 2], "image/png");
        let dir = tempdir().unwrap();
        let repository = Arc::new(FileReportRepository::new(dir.path()));
        let key = ReportKey::new("J1", "E1");
        let mut snapshot = snapshot_with_photo(PhotoItem::new("a.png", PhotoSource::LocalPreview(preview.clone())));
        push_photo(&mut snapshot, PhotoItem::new("b.jpg", PhotoSource::InlineData("data:image/jpeg;base64,AA".into())));
        repository.save(&key, &snapshot).await.unwrap();

        let session = ReportSession::open(key.clone(), &resolver("A"), repository.clone(), assets(), urls.clone())
            .await
            .unwrap();
        session.save().await.unwrap();

        let saved = repository.load(&key).await.unwrap().unwrap();
        let rows = saved.table1.unwrap();
        let photos = &rows[&RowId::table1(1)].defects(VisitKey::V1)[0].photos;
        assert_eq!(photos[0].source, None);
        assert_eq!(photos[0].filename, "a.png");
        assert!(matches!(photos[1].source, Some(PhotoSource::InlineData(_))));
        // 保存してもセッション内のプレビューは使える
        assert!(urls.is_live(&preview));
        let row = session.store().row(TableKey::Table1, &RowId::table1(1));
        assert_eq!(row.defects(VisitKey::V1)[0].photos[0].source, Some(PhotoSource::LocalPreview(preview)));
    }

    #[tokio::test]
    async fn test_open_new_report_is_empty() {
        let dir = tempdir().unwrap();
        let session = ReportSession::open(
            ReportKey::new("J1", "E1"),
            &resolver("C"),
            Arc::new(FileReportRepository::new(dir.path())),
            assets(),
            Arc::new(LocalUrlRegistry::new()),
        )
        .await
        .unwrap();
        assert!(session.store().checklist().is_empty());
        assert_eq!(session.store().rounds().get(), 3);
    }

    #[tokio::test]
    async fn test_reconcile_uploaded_switches_to_remote() {
        let urls = Arc::new(LocalUrlRegistry::new());
        let preview = urls.create(&[1, 2], "image/png");
        let dir = tempdir().unwrap();
        let repository = Arc::new(FileReportRepository::new(dir.path()));
        let key = ReportKey::new("J1", "E1");
        let snapshot = snapshot_with_photo(PhotoItem::new("defect_01022025093000.png", PhotoSource::LocalPreview(preview.clone())));
        repository.save(&key, &snapshot).await.unwrap();

        let mut session = ReportSession::open(key, &resolver("A"), repository, assets(), urls.clone()).await.unwrap();
        let switched = session.reconcile_uploaded(&["defect_01022025093000.png".to_string()]).unwrap();

        assert_eq!(switched, 1);
        assert!(!urls.is_live(&preview));
        let row = session.store().row(TableKey::Table1, &RowId::table1(1));
        assert!(matches!(row.defects(VisitKey::V1)[0].photos[0].source, Some(PhotoSource::Remote(_))));

        // 2回目は何もしない
        assert_eq!(session.reconcile_uploaded(&["defect_01022025093000.png".to_string()]).unwrap(), 0);
    }
}
