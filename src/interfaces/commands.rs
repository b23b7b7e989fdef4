use crate::application::use_cases::codebook_builder::{generate_codebook, load_codebook};
use crate::application::use_cases::column_mapping::{generate_column_mappings, MappingKind};
use crate::application::use_cases::column_transformer::{CodebookTransform, CoalesceOptions};
use crate::application::use_cases::sync_orchestrator::{
    CursorStore, DestinationStore, ResponsePostProcessor, SyncOptions, SyncOrchestrator,
    SyncReport,
};
use crate::domain::app_config::AppConfig;
use crate::domain::codebook::Codebook;
use crate::domain::error::{AppError, Result};
use crate::domain::survey_definition::SurveyDefinition;
use crate::infrastructure::config::ConfigService;
use crate::infrastructure::db::connection::connect_pool;
use crate::infrastructure::db::sqlite::SqliteDestination;
use crate::infrastructure::qualtrics::{ClientConfig, QualtricsClient, QualtricsResponseFetcher};
use crate::infrastructure::sheets::WorkbookDestination;
use crate::interfaces::cli::DestinationKind;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub struct SyncArgs {
    pub kind: DestinationKind,
    pub table_name: Option<String>,
    pub verbose: bool,
    pub join_multiple: bool,
    pub restart: bool,
}

impl SyncArgs {
    fn coalesce_options(&self) -> CoalesceOptions {
        CoalesceOptions {
            use_multiple_marker: !self.join_multiple,
            ..Default::default()
        }
    }
}

fn sibling_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "survey".to_string());
    input.with_file_name(format!("{}-{}.json", stem, suffix))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)?;
    Ok(())
}

pub fn codebook(input: &Path, output: Option<PathBuf>) -> Result<PathBuf> {
    let content = fs::read_to_string(input)?;
    let definition = SurveyDefinition::from_json_str(&content)?;
    let codebook = generate_codebook(&definition)?;

    let output = output.unwrap_or_else(|| sibling_path(input, "codebook"));
    write_json(&output, &codebook)?;
    info!(path = %output.display(), questions = codebook.len(), "Wrote codebook");
    Ok(output)
}

pub fn map_columns(input: &Path, kind: MappingKind, output: Option<PathBuf>) -> Result<PathBuf> {
    let codebook = load_codebook(input)?;
    let mappings = generate_column_mappings(&codebook, kind);

    let output = output.unwrap_or_else(|| sibling_path(input, &format!("{}-map", kind)));
    write_json(&output, &mappings)?;
    info!(path = %output.display(), columns = mappings.len(), "Wrote column mappings");
    Ok(output)
}

async fn resolve_codebook(config: &AppConfig, client: &QualtricsClient) -> Result<Codebook> {
    let survey_id = &config.qualtrics.survey_id;
    match config.qualtrics.codebook_path.as_deref() {
        Some(path) => load_codebook(path),
        None => {
            let document = client.survey_definition(survey_id).await?;
            generate_codebook(&SurveyDefinition::from_value(document)?)
        }
    }
}

pub async fn sync(config_path: &Path, args: SyncArgs) -> Result<SyncReport> {
    let config = ConfigService::load(config_path)?;
    let service = ConfigService::new();
    let token = service.resolve_api_token(&config.qualtrics)?;

    let client = QualtricsClient::new(ClientConfig::from_settings(&config.qualtrics, &token)?);
    let codebook = resolve_codebook(&config, &client).await?;
    let post_process = CodebookTransform::new(Arc::new(codebook))
        .with_verbose(args.verbose)
        .with_coalesce_options(args.coalesce_options())
        .into_post_processor();
    let fetcher =
        QualtricsResponseFetcher::new(client).with_export_settings(&config.qualtrics.export);
    let options = SyncOptions {
        restart: args.restart,
    };
    let survey_id = config.qualtrics.survey_id.as_str();

    match args.kind {
        DestinationKind::Sqlite => {
            let settings = config.sqlite.as_ref().ok_or_else(|| {
                AppError::ConfigError(
                    "Missing [sqlite] section for the sqlite destination".to_string(),
                )
            })?;
            let pool = connect_pool(&settings.url).await?;
            let destination = SqliteDestination::new(pool.clone())
                .with_table_name(args.table_name.or_else(|| settings.table_name.clone()));
            let report = run_sync(
                &fetcher,
                &destination,
                &destination,
                post_process,
                options,
                survey_id,
            )
            .await;
            pool.close().await;
            report
        }
        DestinationKind::Sheets => {
            let settings = config.sheets.as_ref().ok_or_else(|| {
                AppError::ConfigError(
                    "Missing [sheets] section for the sheets destination".to_string(),
                )
            })?;
            let destination = WorkbookDestination::open(&settings.directory)?
                .with_table_name(args.table_name.or_else(|| settings.table_name.clone()));
            run_sync(
                &fetcher,
                &destination,
                &destination,
                post_process,
                options,
                survey_id,
            )
            .await
        }
    }
}

async fn run_sync(
    fetcher: &QualtricsResponseFetcher,
    cursors: &dyn CursorStore,
    destination: &dyn DestinationStore,
    post_process: ResponsePostProcessor,
    options: SyncOptions,
    survey_id: &str,
) -> Result<SyncReport> {
    SyncOrchestrator::new(fetcher, cursors, destination)
        .with_post_processor(post_process)
        .with_options(options)
        .sync(survey_id)
        .await
}

pub fn set_token(data_center: &str, token: &str) -> Result<()> {
    ConfigService::new().save_api_token(data_center, token)?;
    info!(data_center, "Stored API token in the keyring");
    Ok(())
}

pub fn delete_token(data_center: &str) -> Result<()> {
    ConfigService::new().delete_api_token(data_center)?;
    info!(data_center, "Removed API token from the keyring");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITION: &str = r#"{
        "SurveyElements": [
            {"Element": "SQ", "Payload": {
                "QuestionText": "Pick one",
                "DataExportTag": "Q1",
                "QuestionType": "MC",
                "Selector": "SAVR",
                "Choices": {"1": {"Display": "Yes"}, "2": {"Display": "No"}},
                "ChoiceOrder": ["1", "2"]
            }}
        ]
    }"#;

    #[test]
    fn test_codebook_then_map_columns() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("survey.qsf");
        fs::write(&input, DEFINITION).unwrap();

        let codebook_path = codebook(&input, None).unwrap();
        assert_eq!(codebook_path, dir.path().join("survey-codebook.json"));

        let map_path = map_columns(&codebook_path, MappingKind::Tableau, None).unwrap();
        assert_eq!(map_path, dir.path().join("survey-codebook-tableau-map.json"));

        let mappings: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(map_path).unwrap()).unwrap();
        assert_eq!(
            mappings["Q1"],
            "IF [Q1] == 1 THEN 'Yes' ELSEIF [Q1] == 2 THEN 'No' END"
        );
    }

    #[test]
    fn test_join_multiple_disables_marker() {
        let args = SyncArgs {
            kind: DestinationKind::Sqlite,
            table_name: None,
            verbose: false,
            join_multiple: true,
            restart: false,
        };
        assert!(!args.coalesce_options().use_multiple_marker);

        let args = SyncArgs {
            join_multiple: false,
            ..args
        };
        assert_eq!(args.coalesce_options(), CoalesceOptions::default());
    }

    #[test]
    fn test_map_columns_reads_definition_directly() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("survey.qsf");
        fs::write(&input, DEFINITION).unwrap();
        let output = dir.path().join("out.json");

        map_columns(&input, MappingKind::Sql, Some(output.clone())).unwrap();
        assert!(fs::read_to_string(output).unwrap().contains("END AS `Pick one`"));
    }
}
