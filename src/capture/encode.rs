//! 撮影フレーム・選択ファイルの画像処理

use crate::error::{ChecklistError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbaImage};

const JPEG_QUALITY: u8 = 85;

/// フレームをJPEGのdata URLに変換
pub fn frame_to_data_url(frame: &RgbaImage) -> Result<String> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(ChecklistError::CaptureSurface("フレームが空です".into()));
    }

    // JPEGはアルファを持たない
    let rgb = DynamicImage::ImageRgba8(frame.clone()).to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| ChecklistError::ImageEncode(e.to_string()))?;

    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&bytes)))
}

/// 選択ファイルの画像形式（拡張子とMIMEタイプ）
pub fn detect_image(bytes: &[u8]) -> Result<(&'static str, &'static str)> {
    let format = image::guess_format(bytes).map_err(|e| ChecklistError::ImageDecode(e.to_string()))?;
    let extension = match format {
        ImageFormat::Jpeg => "jpg",
        other => other.extensions_str().first().copied().unwrap_or("img"),
    };
    Ok((extension, format.to_mime_type()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_frame_to_data_url() {
        let frame = RgbaImage::from_pixel(4, 3, Rgba([200, 10, 10, 255]));
        let url = frame_to_data_url(&frame).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,/9j/"));
    }

    #[test]
    fn test_empty_frame_rejected() {
        let frame = RgbaImage::new(0, 0);
        assert!(matches!(frame_to_data_url(&frame), Err(ChecklistError::CaptureSurface(_))));
    }

    #[test]
    fn test_detect_png() {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::new(2, 2))
            .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        assert_eq!(detect_image(&bytes).unwrap(), ("png", "image/png"));
    }

    #[test]
    fn test_detect_not_an_image() {
        assert!(matches!(detect_image(b"hello world"), Err(ChecklistError::ImageDecode(_))));
    }
}
