use clap::{Parser, Subcommand};
use inspection_common::{TableKey, VisitKey, VisitState};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "inspection-checklist")]
#[command(about = "点検チェックリスト・不具合記録ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 様式区分を指定（照会サービスを使わない）
    #[arg(long, global = true)]
    pub form_type: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 設備の点検回次数を表示
    Rounds {
        /// 設備ID
        #[arg(required = true)]
        equipment: String,
    },

    /// 点検票を表示
    Show {
        /// 業務ID
        job: String,
        /// 設備ID
        equipment: String,
    },

    /// 判定を切り替え（同じ値の再指定で未設定に戻る）
    Toggle {
        job: String,
        equipment: String,
        /// 表 (table1/table2)
        #[arg(value_parser = parse_table)]
        table: TableKey,
        /// 行ID (例: t1-1, t2-1-3)
        row: String,
        /// 回次 (v1/v2/v3)
        #[arg(value_parser = parse_visit)]
        visit: VisitKey,
        /// 判定 (ok/ng)
        #[arg(value_parser = parse_state)]
        state: VisitState,
    },

    /// 備考を設定
    Note {
        job: String,
        equipment: String,
        #[arg(value_parser = parse_table)]
        table: TableKey,
        row: String,
        /// 備考（空文字で消去）
        text: String,
    },

    /// 「その他（　）」行の追記テキストを設定
    Extra {
        job: String,
        equipment: String,
        #[arg(value_parser = parse_table)]
        table: TableKey,
        row: String,
        text: String,
    },

    /// 不具合を登録（回次の不具合リストを置き換える）
    Defect {
        job: String,
        equipment: String,
        #[arg(value_parser = parse_table)]
        table: TableKey,
        row: String,
        #[arg(value_parser = parse_visit)]
        visit: VisitKey,

        /// 指摘事項ID（複数指定可）
        #[arg(short, long = "problem")]
        problems: Vec<String>,

        /// 「その他」の指摘事項名
        #[arg(long)]
        other_name: Option<String>,

        /// 「その他」の是正内容
        #[arg(long)]
        other_suggestion: Option<String>,

        /// 「その他」の法令条項ID
        #[arg(long)]
        legal: Option<String>,
    },

    /// 不具合に写真を追加
    Photo {
        job: String,
        equipment: String,
        #[arg(value_parser = parse_table)]
        table: TableKey,
        row: String,
        #[arg(value_parser = parse_visit)]
        visit: VisitKey,
        /// 不具合の位置（0始まり）
        defect_index: usize,
        /// 画像ファイル
        file: PathBuf,
    },

    /// アップロード済みの写真をリモート参照に切り替え
    Uploaded {
        job: String,
        equipment: String,
        /// アップロード済みのファイル名
        #[arg(required = true)]
        filenames: Vec<String>,
    },

    /// 設定を表示/編集
    Config {
        /// 写真URLのベースを設定
        #[arg(long)]
        set_asset_base: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

fn parse_table(s: &str) -> Result<TableKey, String> {
    TableKey::parse(s).ok_or_else(|| format!("Unknown table: {}. Use table1 or table2", s))
}

fn parse_visit(s: &str) -> Result<VisitKey, String> {
    VisitKey::parse(s).ok_or_else(|| format!("Unknown visit: {}. Use v1, v2 or v3", s))
}

fn parse_state(s: &str) -> Result<VisitState, String> {
    match VisitState::parse(s) {
        Some(VisitState::Unset) | None => Err(format!("Unknown state: {}. Use ok or ng", s)),
        Some(state) => Ok(state),
    }
}
