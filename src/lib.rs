pub mod cli;
pub mod clients;
pub mod collect;
pub mod config;
pub mod db;
pub mod domain;
pub mod entities;
pub mod state;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::{BindCommands, CategoryCommands, Cli, Commands, RecordCommands, SourceCommands};
pub use config::Config;
use state::SharedState;

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    if matches!(command, Commands::Init) {
        if Config::create_default_if_missing()? {
            println!("✓ Config file created. Edit config.toml and run again.");
        } else {
            println!("Config file already exists.");
        }
        return Ok(());
    }

    let config = Config::load()?;
    config.validate()?;

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match command {
        Commands::Init => Ok(()),

        Commands::Source { command } => match command {
            SourceCommands::Add {
                name,
                url,
                format,
                suffix,
                sync_images,
                group_merge,
            } => {
                cli::cmd_source_add(
                    &config,
                    &name,
                    &url,
                    &format,
                    &suffix,
                    sync_images,
                    group_merge.as_deref(),
                )
                .await
            }
            SourceCommands::List => cli::cmd_source_list(&config).await,
            SourceCommands::Show { source } => cli::cmd_source_show(&config, &source).await,
            SourceCommands::Remove { source } => cli::cmd_source_remove(&config, &source).await,
            SourceCommands::Rules {
                source,
                kind,
                mode,
                dedup,
                merge,
            } => {
                cli::cmd_source_rules(
                    &config,
                    &source,
                    &kind,
                    mode.as_deref(),
                    dedup.as_deref(),
                    merge.as_deref(),
                )
                .await
            }
            SourceCommands::Filters {
                source,
                names,
                years,
                play,
                down,
            } => cli::cmd_source_filters(&config, &source, names, years, play, down).await,
        },

        Commands::Category { command } => match command {
            CategoryCommands::Add { name, parent } => {
                cli::cmd_category_add(&config, &name, parent).await
            }
            CategoryCommands::List => cli::cmd_category_list(&config).await,
        },

        Commands::Bind { command } => match command {
            BindCommands::Add {
                source,
                remote,
                local,
            } => cli::cmd_bind_add(&config, &source, &remote, local).await,
            BindCommands::List { source } => cli::cmd_bind_list(&config, &source).await,
            BindCommands::Remove { source, remote } => {
                cli::cmd_bind_remove(&config, &source, &remote).await
            }
        },

        Commands::Taxonomy { source } => {
            let state = SharedState::new(config).await?;
            cli::cmd_taxonomy(&state, &source).await
        }

        Commands::Collect {
            source,
            kind,
            type_id,
            hours,
            ids,
            keyword,
            page,
            resume,
        } => {
            let state = SharedState::new(config).await?;
            let args = cli::CollectArgs {
                type_id,
                hours,
                ids,
                keyword,
                page,
                resume,
            };
            cli::cmd_collect(&state, &source, &kind, args).await
        }

        Commands::Cancel { source, kind } => cli::cmd_cancel(&config, &source, &kind).await,

        Commands::Status => cli::cmd_status(&config).await,

        Commands::Record { command } => match command {
            RecordCommands::Lock { id } => cli::cmd_record_lock(&config, id, true).await,
            RecordCommands::Unlock { id } => cli::cmd_record_lock(&config, id, false).await,
        },
    }
}
