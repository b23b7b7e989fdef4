use crate::interfaces::cli::{Cli, Commands, TokenCommands};
use crate::interfaces::commands::{self, SyncArgs};
use crate::domain::error::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

pub fn run() -> ExitCode {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let cli = Cli::parse();
    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Command failed");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Codebook { input, output } => {
            let path = commands::codebook(&input, output)?;
            println!("{}", path.display());
        }
        Commands::MapColumns {
            input,
            kind,
            output,
        } => {
            let path = commands::map_columns(&input, kind.into(), output)?;
            println!("{}", path.display());
        }
        Commands::Sync {
            kind,
            table_name,
            verbose,
            join_multiple,
            restart,
        } => {
            let runtime = tokio::runtime::Runtime::new()?;
            let args = SyncArgs {
                kind,
                table_name,
                verbose,
                join_multiple,
                restart,
            };
            let report = runtime.block_on(commands::sync(&cli.config, args))?;
            println!(
                "{}: fetched {} rows, wrote {} rows, last response {}",
                report.survey_id,
                report.rows_fetched,
                report.rows_written,
                report.cursor.last_response_id.as_deref().unwrap_or("-")
            );
        }
        Commands::Token { command } => match command {
            TokenCommands::Set { token, data_center } => {
                commands::set_token(&data_center, &token)?
            }
            TokenCommands::Delete { data_center } => commands::delete_token(&data_center)?,
        },
    }
    Ok(())
}
