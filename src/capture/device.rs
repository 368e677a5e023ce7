//! カメラ・ファイル選択の抽象
//!
//! ブラウザでは getUserMedia / `<input type=file>` に相当する。

use crate::error::Result;
use async_trait::async_trait;
use image::RgbaImage;
use std::path::PathBuf;
use thiserror::Error;

/// 要求するカメラの向き
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    /// 背面（environment）
    Environment,
    User,
}

/// カメラ取得の失敗理由（呼び出し側ではファイル選択へフォールバックする）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraUnavailable {
    #[error("カメラの使用が許可されていません")]
    PermissionDenied,

    #[error("カメラが見つかりません")]
    NoDevice,

    #[error("カメラを起動できません: {0}")]
    Other(String),
}

#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn acquire(&self, facing: CameraFacing) -> std::result::Result<Box<dyn CameraStream>, CameraUnavailable>;
}

/// 取得済みのライブストリーム
pub trait CameraStream: Send {
    /// 現在のフレームをオフスクリーンに描画して取得
    fn grab_frame(&mut self) -> Result<RgbaImage>;

    /// ストリームを停止（複数回呼ばれてもよい）
    fn stop(&mut self);
}

/// カメラを持たない環境（CLIなど）。常にファイル選択へ倒れる
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableCamera;

#[async_trait]
impl CameraDevice for UnavailableCamera {
    async fn acquire(&self, _facing: CameraFacing) -> std::result::Result<Box<dyn CameraStream>, CameraUnavailable> {
        Err(CameraUnavailable::NoDevice)
    }
}

/// ファイル選択で得たファイル
#[async_trait]
pub trait PickedFile: Send + Sync {
    fn name(&self) -> String;
    async fn read(&self) -> std::io::Result<Vec<u8>>;
}

#[async_trait]
impl PickedFile for PathBuf {
    fn name(&self) -> String {
        self.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self).await
    }
}

/// 読み込み済みのバイト列
#[derive(Debug, Clone)]
pub struct MemoryFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
impl PickedFile for MemoryFile {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn read(&self) -> std::io::Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}
