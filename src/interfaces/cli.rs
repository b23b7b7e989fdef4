use crate::application::use_cases::column_mapping::MappingKind;
use crate::domain::app_config::DEFAULT_DATA_CENTER;
use crate::infrastructure::config::DEFAULT_CONFIG_PATH;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "qualtrics-sync", version, about = "Survey response sync and codebook tools")]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_CONFIG_PATH,
        help = "Configuration file (TOML); QUALTRICS_SYNC_* variables override it"
    )]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a codebook from a survey definition export.
    Codebook {
        input: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Generate recode expressions from a definition or codebook file.
    MapColumns {
        input: PathBuf,
        #[arg(long, value_enum, default_value_t = MappingKindArg::Sql)]
        kind: MappingKindArg,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Pull new responses into the configured destination.
    Sync {
        #[arg(long, value_enum, default_value_t = DestinationKind::Sqlite)]
        kind: DestinationKind,
        #[arg(long)]
        table_name: Option<String>,
        #[arg(long, default_value_t = false, help = "Rename columns to \"number - text\"")]
        verbose: bool,
        #[arg(
            long,
            default_value_t = false,
            help = "Join multi-select answers instead of writing \"Multiple\""
        )]
        join_multiple: bool,
        #[arg(long, default_value_t = false, help = "Drop existing data and export everything")]
        restart: bool,
    },
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum TokenCommands {
    Set {
        token: String,
        #[arg(long, default_value = DEFAULT_DATA_CENTER)]
        data_center: String,
    },
    Delete {
        #[arg(long, default_value = DEFAULT_DATA_CENTER)]
        data_center: String,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DestinationKind {
    Sqlite,
    Sheets,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum MappingKindArg {
    Sql,
    Tableau,
}

impl From<MappingKindArg> for MappingKind {
    fn from(kind: MappingKindArg) -> Self {
        match kind {
            MappingKindArg::Sql => MappingKind::Sql,
            MappingKindArg::Tableau => MappingKind::Tableau,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync_flags() {
        let cli = Cli::try_parse_from([
            "qualtrics-sync",
            "--config",
            "survey.toml",
            "sync",
            "--kind",
            "sheets",
            "--table-name",
            "wellbeing",
            "--restart",
            "--join-multiple",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("survey.toml"));
        match cli.command {
            Commands::Sync {
                kind,
                table_name,
                verbose,
                join_multiple,
                restart,
            } => {
                assert_eq!(kind, DestinationKind::Sheets);
                assert_eq!(table_name.as_deref(), Some("wellbeing"));
                assert!(!verbose);
                assert!(join_multiple);
                assert!(restart);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_map_columns_defaults() {
        let cli = Cli::try_parse_from(["qualtrics-sync", "map-columns", "survey.qsf"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        match cli.command {
            Commands::MapColumns { kind, output, .. } => {
                assert_eq!(MappingKind::from(kind), MappingKind::Sql);
                assert!(output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_token_requires_subcommand() {
        assert!(Cli::try_parse_from(["qualtrics-sync", "token"]).is_err());
    }
}
