use clap::Parser;
use inspection_checklist::{assets, capture, catalog, cli, config, error, logging, lookup, report, rounds, workflow};
use inspection_common::{labels, FormTypeTable, RowId, TableKey};
use assets::{LocalUrlRegistry, RemoteAssetResolver};
use capture::{OpenOutcome, UnavailableCamera};
use catalog::{LegalCatalog, ProblemCatalog};
use cli::{Cli, Commands};
use config::Config;
use error::{ChecklistError, Result};
use lookup::{ClassificationLookup, HttpClassificationLookup, NoClassification, StaticClassificationLookup};
use report::{FileReportRepository, ReportKey, ReportRepository, ReportSession};
use rounds::RoundResolver;
use std::sync::Arc;
use workflow::{CommitOutcome, DefectEditor, ValidationReport};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = Config::load()?;
    let resolver = round_resolver(&config, cli.form_type.as_deref())?;

    match cli.command {
        Commands::Rounds { equipment } => {
            let rounds = resolver.resolve(&equipment).await;
            println!("{}: {}回次", equipment, rounds.get());
        }

        Commands::Show { job, equipment } => {
            let key = ReportKey::new(job, equipment);
            let repository = FileReportRepository::new(config.report_dir()?);
            let session = open_session(&config, &resolver, key, repository).await?;
            print_report(&session);
        }

        Commands::Toggle { job, equipment, table, row, visit, state } => {
            let mut session = open_new_or_existing(&config, &resolver, job, equipment).await?;
            let next = session.store_mut().toggle_visit(table, &row_id(table, &row)?, visit, state)?;
            session.save().await?;
            println!("✔ {} {} {} → {}", table, row, visit, next.symbol());
        }

        Commands::Note { job, equipment, table, row, text } => {
            let mut session = open_new_or_existing(&config, &resolver, job, equipment).await?;
            let mut editor = session.note_editor(table, row_id(table, &row)?)?;
            editor.set_text(text)?;
            editor.save(session.store_mut())?;
            session.save().await?;
            println!("✔ 備考を保存しました: {} {}", table, row);
        }

        Commands::Extra { job, equipment, table, row, text } => {
            let mut session = open_new_or_existing(&config, &resolver, job, equipment).await?;
            session.store_mut().set_extra_text(table, &row_id(table, &row)?, text)?;
            session.save().await?;
            println!("✔ 追記を保存しました: {} {}", table, row);
        }

        Commands::Defect { job, equipment, table, row, visit, problems, other_name, other_suggestion, legal } => {
            let mut session = open_new_or_existing(&config, &resolver, job, equipment).await?;
            let mut editor = session.defect_editor(table, row_id(table, &row)?, visit)?;

            if !problems.is_empty() {
                let catalog = load_problem_catalog(&config)?;
                let selected = problems
                    .iter()
                    .map(|id| catalog.get(id).cloned())
                    .collect::<Result<Vec<_>>>()?;
                editor.set_catalog_selection(&selected)?;
            }

            if other_name.is_some() || other_suggestion.is_some() || legal.is_some() {
                let index = match editor.other_index() {
                    Some(index) => index,
                    None => {
                        editor.toggle_other()?;
                        editor.other_index().ok_or(ChecklistError::NotOtherDefect)?
                    }
                };
                if let Some(name) = other_name {
                    editor.set_other_name(name)?;
                }
                if let Some(suggestion) = other_suggestion {
                    editor.set_suggestion(index, suggestion)?;
                }
                if let Some(id) = legal {
                    let catalog = load_legal_catalog(&config)?;
                    let reference = catalog.find(&id).ok_or(ChecklistError::CatalogEntry(id.clone()))?;
                    editor.set_legal_reference(index, Some(reference))?;
                }
            }

            if commit_and_report(&mut editor, &mut session)? {
                session.save().await?;
                println!("✔ 不具合を{}件登録しました", editor.draft().len());
            }
        }

        Commands::Photo { job, equipment, table, row, visit, defect_index, file } => {
            let mut session = open_new_or_existing(&config, &resolver, job, equipment).await?;
            let mut capture = session.photo_capture(Arc::new(UnavailableCamera));
            let mut editor = session.defect_editor(table, row_id(table, &row)?, visit)?;

            match editor.open_photo(&mut capture, defect_index).await? {
                OpenOutcome::Rejected => {
                    println!("✗ 写真は1件につき2枚までです");
                    return Ok(());
                }
                OpenOutcome::CameraLive => {
                    // CLIではカメラを使わないため、ファイル選択へ切り替える
                    capture.close();
                    return Err(ChecklistError::InvalidState { operation: "photo", state: "camera-live" });
                }
                OpenOutcome::FilePicker => {}
            }

            editor.pick_photo(&mut capture, &file).await?;
            let photo = editor.confirm_photo(&mut capture)?;

            if commit_and_report(&mut editor, &mut session)? {
                session.save().await?;
                println!("✔ 写真を追加しました: {}", photo.filename);
            }
        }

        Commands::Uploaded { job, equipment, filenames } => {
            let key = ReportKey::new(job, equipment);
            let repository = FileReportRepository::new(config.report_dir()?);
            let mut session = open_session(&config, &resolver, key, repository).await?;
            let switched = session.reconcile_uploaded(&filenames)?;
            session.save().await?;
            println!("✔ {}枚の写真をリモート参照に切り替えました", switched);
        }

        Commands::Config { set_asset_base, show } => {
            let mut config = config;

            if let Some(url) = set_asset_base {
                RemoteAssetResolver::new(&url)?;
                config.set_asset_base_url(url)?;
                println!("✔ 写真URLのベースを設定しました");
            }

            if show {
                println!("設定:");
                println!("  写真URLベース: {}", config.asset_base_url);
                println!(
                    "  様式区分の照会先: {}",
                    config.classification_url.as_deref().unwrap_or("未設定")
                );
                println!("  点検データ保存先: {}", config.report_dir()?.display());
                for (token, rounds) in config.form_type_rounds.entries() {
                    println!("  様式区分 {}: {}回次", token, rounds);
                }
                println!("  タイムアウト: {}秒", config.timeout_seconds);
            }
        }
    }

    Ok(())
}

fn round_resolver(config: &Config, form_type: Option<&str>) -> Result<RoundResolver<Box<dyn ClassificationLookup>>> {
    let lookup: Box<dyn ClassificationLookup> = match (form_type, config.classification_url.as_deref()) {
        (Some(token), _) => Box::new(StaticClassificationLookup::uniform(token)),
        (None, Some(url)) => Box::new(HttpClassificationLookup::new(url, config.timeout_seconds)?),
        (None, None) => Box::new(NoClassification),
    };
    let table: FormTypeTable = config.form_type_rounds.clone();
    Ok(RoundResolver::new(lookup, table))
}

async fn open_session(
    config: &Config,
    resolver: &RoundResolver<Box<dyn ClassificationLookup>>,
    key: ReportKey,
    repository: FileReportRepository,
) -> Result<ReportSession> {
    if !repository.exists(&key).await? {
        return Err(ChecklistError::ReportNotFound(key.to_string()));
    }
    open_with(config, resolver, key, repository).await
}

async fn open_new_or_existing(
    config: &Config,
    resolver: &RoundResolver<Box<dyn ClassificationLookup>>,
    job: String,
    equipment: String,
) -> Result<ReportSession> {
    let repository = FileReportRepository::new(config.report_dir()?);
    open_with(config, resolver, ReportKey::new(job, equipment), repository).await
}

async fn open_with(
    config: &Config,
    resolver: &RoundResolver<Box<dyn ClassificationLookup>>,
    key: ReportKey,
    repository: FileReportRepository,
) -> Result<ReportSession> {
    let assets = RemoteAssetResolver::new(&config.asset_base_url)?;
    ReportSession::open(key, resolver, Arc::new(repository), assets, Arc::new(LocalUrlRegistry::new())).await
}

/// 入力された行IDを静的ラベル表で検証
fn row_id(table: TableKey, row: &str) -> Result<RowId> {
    let row_id = RowId::new(row.trim());
    labels::resolve_label(table, &row_id)?;
    Ok(row_id)
}

fn load_problem_catalog(config: &Config) -> Result<ProblemCatalog> {
    let path = config
        .problem_catalog_path
        .as_ref()
        .ok_or_else(|| ChecklistError::Config("指摘事項カタログが設定されていません".into()))?;
    ProblemCatalog::from_file(path)
}

fn load_legal_catalog(config: &Config) -> Result<LegalCatalog> {
    let path = config
        .legal_catalog_path
        .as_ref()
        .ok_or_else(|| ChecklistError::Config("法令条項カタログが設定されていません".into()))?;
    LegalCatalog::from_file(path)
}

/// 確定して結果を表示（確定できたら true）
fn commit_and_report(editor: &mut DefectEditor, session: &mut ReportSession) -> Result<bool> {
    match editor.commit(session.store_mut())? {
        CommitOutcome::Committed(_) => Ok(true),
        CommitOutcome::Rejected(report) => {
            print_validation(editor, &report);
            Ok(false)
        }
    }
}

fn print_validation(editor: &DefectEditor, report: &ValidationReport) {
    println!("✗ 入力不足のため確定しませんでした");
    if report.missing_other_name {
        println!("  - 「その他」の指摘事項名を入力してください");
    }
    for &index in &report.missing_suggestions {
        if let Some(defect) = editor.draft().get(index) {
            println!("  - [{}] {} の是正内容を入力してください", index, defect.problem_name);
        }
    }
}

fn print_report(session: &ReportSession) {
    let store = session.store();
    let visits = store.visit_keys();
    println!("📋 {} （{}回次）", session.key(), store.rounds().get());

    for table in TableKey::ALL {
        println!("\n[{}]", table);
        let mut current_group = None;
        for row_id in labels::row_ids(table) {
            let group = labels::group_title(&row_id);
            if group.is_some() && group != current_group {
                println!("  ■ {}", group.unwrap_or_default());
                current_group = group;
            }

            let row = store.row(table, &row_id);
            let label = store.label(table, &row_id).unwrap_or_default();
            let marks: Vec<String> = visits.iter().map(|v| format!("{}:{}", v, row.visit(*v).symbol())).collect();
            let extra = row.extra_text.as_deref().map(|t| format!("（{}）", t)).unwrap_or_default();
            println!("  {:<8} {}{}  {}", row_id.as_str(), label, extra, marks.join(" "));

            if !row.note.is_empty() {
                println!("           備考: {}", row.note);
            }
            for visit in visits {
                for defect in row.defects(*visit) {
                    println!(
                        "           {} 不具合: {} / 是正: {} / 写真{}枚",
                        visit,
                        defect.problem_name,
                        defect.suggestion_text,
                        defect.photos.len()
                    );
                }
            }
        }
    }
}
