//! 不具合写真の撮影・選択・閲覧
//!
//! 状態遷移:
//! ```text
//! Idle → CameraRequesting → CameraLive → CapturedPending → (confirm) Idle
//!                         ↘ AwaitingFile ↗ (pick_file)    ↘ (retake) CameraLive
//! Idle → Viewing → (delete_viewed / close) Idle
//! ```
//!
//! カメラストリームは排他資源で、同時に1つしか保持しない。`close` はどの状態
//! からでも呼べて、ストリーム停止と未確定のプレビューURL失効を必ず行う。
//! 写真は編集中の下書き（`&mut [Defect]`）に対して追加・削除される。
//! 確定した写真のプレビューURLは下書き側の所有となる。

mod device;
mod encode;
mod filename;

pub use device::{
    CameraDevice, CameraFacing, CameraStream, CameraUnavailable, MemoryFile, PickedFile,
    UnavailableCamera,
};
pub use encode::{detect_image, frame_to_data_url};
pub use filename::FilenameGenerator;

use crate::assets::{ObjectUrlRegistry, RemoteAssetResolver};
use crate::error::{ChecklistError, Result};
use inspection_common::{Defect, PhotoItem, PhotoSource, RowId, TableKey, VisitKey, MAX_PHOTOS_PER_DEFECT};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    CameraRequesting,
    CameraLive,
    /// カメラ取得に失敗し、ファイル選択を表示中
    AwaitingFile,
    CapturedPending,
    Viewing,
}

impl CaptureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::CameraRequesting => "camera-requesting",
            CaptureState::CameraLive => "camera-live",
            CaptureState::AwaitingFile => "awaiting-file",
            CaptureState::CapturedPending => "captured-pending",
            CaptureState::Viewing => "viewing",
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 写真の追加先（行・回次・下書き内の不具合位置）
///
/// 撮影中に下書きが並び替わっても別の不具合へ付かないよう、開始時点の
/// 指摘事項IDも持つ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoTarget {
    pub table: TableKey,
    pub row_id: RowId,
    pub visit: VisitKey,
    pub defect_index: usize,
    pub problem_id: String,
}

impl PhotoTarget {
    /// 下書き内の対象位置（指摘事項IDが一致しなければエラー）
    pub fn locate(&self, defects: &[Defect]) -> Result<usize> {
        match defects.get(self.defect_index) {
            None => Err(ChecklistError::DefectIndex(self.defect_index)),
            Some(defect) if defect.problem_id != self.problem_id => {
                Err(ChecklistError::PhotoTargetChanged(self.problem_id.clone()))
            }
            Some(_) => Ok(self.defect_index),
        }
    }
}

/// `open` の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    CameraLive,
    /// カメラが使えずファイル選択へフォールバックした
    FilePicker,
    /// 既に上限枚数に達している（何もしない）
    Rejected,
}

/// 閲覧中の写真
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewedPhoto {
    pub target: PhotoTarget,
    pub photo_index: usize,
    pub filename: String,
    pub display_url: String,
}

pub struct PhotoCapture {
    camera: Arc<dyn CameraDevice>,
    urls: Arc<dyn ObjectUrlRegistry>,
    assets: RemoteAssetResolver,
    filenames: FilenameGenerator,
    state: CaptureState,
    target: Option<PhotoTarget>,
    stream: Option<Box<dyn CameraStream>>,
    pending: Option<PhotoItem>,
    /// このセッションが所有する（未確定の）プレビューURL
    owned_urls: Vec<String>,
    viewing: Option<ViewedPhoto>,
}

impl PhotoCapture {
    pub fn new(
        camera: Arc<dyn CameraDevice>,
        urls: Arc<dyn ObjectUrlRegistry>,
        assets: RemoteAssetResolver,
    ) -> Self {
        Self {
            camera,
            urls,
            assets,
            filenames: FilenameGenerator::new(),
            state: CaptureState::Idle,
            target: None,
            stream: None,
            pending: None,
            owned_urls: Vec::new(),
            viewing: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn target(&self) -> Option<&PhotoTarget> {
        self.target.as_ref()
    }

    /// 確定待ちの写真
    pub fn pending(&self) -> Option<&PhotoItem> {
        self.pending.as_ref()
    }

    pub fn viewing(&self) -> Option<&ViewedPhoto> {
        self.viewing.as_ref()
    }

    pub fn has_live_stream(&self) -> bool {
        self.stream.is_some()
    }

    pub fn url_registry(&self) -> Arc<dyn ObjectUrlRegistry> {
        self.urls.clone()
    }

    /// 撮影を開始
    ///
    /// 対象の不具合が既に2枚持っていれば `Rejected` を返して何もしない
    /// （撮影中の別セッションもそのまま）。それ以外は前のセッションを閉じてから
    /// 始める。カメラが使えなければファイル選択へ倒れる。
    pub async fn open(&mut self, target: PhotoTarget, defects: &[Defect]) -> Result<OpenOutcome> {
        let index = target.locate(defects)?;
        if !defects[index].can_add_photo() {
            tracing::debug!(defect_index = index, "photo limit reached, open ignored");
            return Ok(OpenOutcome::Rejected);
        }

        self.close();
        self.target = Some(target);
        Ok(self.acquire_camera().await)
    }

    async fn acquire_camera(&mut self) -> OpenOutcome {
        self.transition(CaptureState::CameraRequesting);

        match self.camera.acquire(CameraFacing::Environment).await {
            Ok(stream) => {
                self.stream = Some(stream);
                self.transition(CaptureState::CameraLive);
                OpenOutcome::CameraLive
            }
            Err(e) => {
                tracing::warn!(error = %e, "camera unavailable, falling back to file picker");
                self.transition(CaptureState::AwaitingFile);
                OpenOutcome::FilePicker
            }
        }
    }

    /// 現在のフレームを撮影（ストリームは即座に停止する）
    pub fn capture(&mut self) -> Result<&PhotoItem> {
        self.require(CaptureState::CameraLive, "capture")?;

        let encoded = match self.stream.as_mut() {
            Some(stream) => stream.grab_frame().and_then(|frame| frame_to_data_url(&frame)),
            None => Err(ChecklistError::CaptureSurface("ストリームがありません".into())),
        };
        self.stop_stream();

        match encoded {
            Ok(data_url) => {
                let filename = self.filenames.next("jpg");
                self.transition(CaptureState::CapturedPending);
                let pending = self.pending.insert(PhotoItem::new(filename, PhotoSource::InlineData(data_url)));
                tracing::debug!(filename = %pending.filename, "frame captured");
                Ok(&*pending)
            }
            Err(e) => {
                tracing::warn!(error = %e, "capture failed");
                self.close();
                Err(e)
            }
        }
    }

    /// 撮り直し（確定待ちを破棄してカメラを再取得）
    pub async fn retake(&mut self) -> Result<OpenOutcome> {
        self.require(CaptureState::CapturedPending, "retake")?;
        self.discard_pending();
        Ok(self.acquire_camera().await)
    }

    /// ファイル選択の結果を確定待ちにする
    pub async fn pick_file(&mut self, file: &dyn PickedFile, defects: &[Defect]) -> Result<&PhotoItem> {
        self.require(CaptureState::AwaitingFile, "pick_file")?;

        if let Err(e) = self.check_capacity(defects) {
            self.close();
            return Err(e);
        }

        let loaded = match file.read().await {
            Ok(bytes) => match detect_image(&bytes) {
                Ok((extension, mime)) => Ok((bytes, extension, mime)),
                Err(e) => Err(e),
            },
            Err(e) => Err(ChecklistError::Io(e)),
        };
        let (bytes, extension, mime) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(file = %file.name(), error = %e, "picked file could not be read");
                self.close();
                return Err(e);
            }
        };

        let url = self.urls.create(&bytes, mime);
        self.owned_urls.push(url.clone());

        let filename = self.filenames.next(extension);
        self.transition(CaptureState::CapturedPending);
        let pending = self.pending.insert(PhotoItem::new(filename, PhotoSource::LocalPreview(url)));
        tracing::debug!(filename = %pending.filename, source = %file.name(), "file picked");
        Ok(&*pending)
    }

    /// 確定待ちの写真を下書きの不具合に追加
    pub fn confirm(&mut self, defects: &mut [Defect]) -> Result<PhotoItem> {
        self.require(CaptureState::CapturedPending, "confirm")?;

        if let Err(e) = self.check_capacity(defects) {
            self.close();
            return Err(e);
        }

        let (Some(target), Some(photo)) = (self.target.take(), self.pending.take()) else {
            self.close();
            return Err(ChecklistError::InvalidState { operation: "confirm", state: self.state.as_str() });
        };
        let index = match target.locate(defects) {
            Ok(index) => index,
            Err(e) => {
                self.close();
                return Err(e);
            }
        };
        let defect = &mut defects[index];

        // プレビューURLの所有権は写真へ移る
        if let Some(url) = photo.local_preview_url() {
            self.owned_urls.retain(|owned| owned != url);
        }
        defect.photos.push(photo.clone());

        self.close();
        tracing::debug!(filename = %photo.filename, defect_index = target.defect_index, "photo confirmed");
        Ok(photo)
    }

    /// 確定済みの写真を閲覧
    pub fn view(&mut self, target: PhotoTarget, photo_index: usize, defects: &[Defect]) -> Result<&ViewedPhoto> {
        let defect = &defects[target.locate(defects)?];
        let photo = defect.photos.get(photo_index).ok_or(ChecklistError::PhotoIndex(photo_index))?;

        self.close();

        let viewed = ViewedPhoto {
            target,
            photo_index,
            filename: photo.filename.clone(),
            display_url: self.assets.display_url(photo),
        };
        self.transition(CaptureState::Viewing);
        Ok(&*self.viewing.insert(viewed))
    }

    /// 閲覧中の写真を削除
    pub fn delete_viewed(&mut self, defects: &mut [Defect]) -> Result<PhotoItem> {
        self.require(CaptureState::Viewing, "delete_viewed")?;

        let Some(viewed) = self.viewing.take() else {
            self.close();
            return Err(ChecklistError::InvalidState { operation: "delete_viewed", state: "viewing" });
        };
        self.close();

        let index = viewed.target.locate(defects)?;
        let defect = &mut defects[index];
        match defect.photos.get(viewed.photo_index) {
            Some(photo) if photo.filename == viewed.filename => {}
            _ => return Err(ChecklistError::PhotoIndex(viewed.photo_index)),
        }

        // プレビューURLは一覧の所有者（編集画面）が確定・破棄時に失効させる
        let removed = defect.photos.remove(viewed.photo_index);
        tracing::debug!(filename = %removed.filename, "photo deleted");
        Ok(removed)
    }

    /// オーバーレイを閉じる（どの状態からでも可）
    pub fn close(&mut self) {
        self.stop_stream();
        self.discard_pending();
        self.target = None;
        self.viewing = None;
        if self.state != CaptureState::Idle {
            self.transition(CaptureState::Idle);
        }
    }

    fn discard_pending(&mut self) {
        self.pending = None;
        for url in self.owned_urls.drain(..) {
            self.urls.revoke(&url);
        }
    }

    fn stop_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            tracing::debug!("camera stream stopped");
        }
    }

    fn check_capacity(&self, defects: &[Defect]) -> Result<()> {
        let target = self
            .target
            .as_ref()
            .ok_or(ChecklistError::InvalidState { operation: "check_capacity", state: self.state.as_str() })?;
        if defects[target.locate(defects)?].can_add_photo() {
            Ok(())
        } else {
            Err(ChecklistError::PhotoCapacity(MAX_PHOTOS_PER_DEFECT))
        }
    }

    fn require(&self, expected: CaptureState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ChecklistError::InvalidState { operation, state: self.state.as_str() })
        }
    }

    fn transition(&mut self, next: CaptureState) {
        tracing::debug!(from = %self.state, to = %next, "capture state");
        self.state = next;
    }
}

impl Drop for PhotoCapture {
    fn drop(&mut self) {
        self.close();
    }
}
