//! 写真ファイル名の生成
//!
//! `defect_DDMMYYYYhhmmss.<ext>`。同一セッション内で同じ秒に複数枚撮影した
//! 場合は1秒ずつ進めて重複を避ける。

use chrono::{Duration, Local, NaiveDateTime};

const PREFIX: &str = "defect_";
const TIMESTAMP_FORMAT: &str = "%d%m%Y%H%M%S";

#[derive(Debug, Clone, Default)]
pub struct FilenameGenerator {
    last: Option<NaiveDateTime>,
}

impl FilenameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, extension: &str) -> String {
        self.next_at(Local::now().naive_local(), extension)
    }

    pub fn next_at(&mut self, now: NaiveDateTime, extension: &str) -> String {
        let stamp = match self.last {
            Some(last) if now <= last => last + Duration::seconds(1),
            _ => now,
        };
        self.last = Some(stamp);
        format!("{}{}.{}", PREFIX, stamp.format(TIMESTAMP_FORMAT), extension)
    }
}
