use std::{
    fs, io,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dg_mm::{
    error::MetadataError,
    grdm::ProjectMetadataSelector,
    logging,
    manager::{GetMetadataParams, MetadataManager},
    output::{self, OutputError},
    settings::Settings,
};

#[derive(Parser, Debug)]
#[command(name = "metadatamanager", author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long, global = true, env = "METADATAMANAGER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Collects metadata from a storage and returns it in the given schema
    Get {
        /// Name of the target schema
        #[arg(long)]
        schema: String,

        /// Name of the storage to read from
        #[arg(long)]
        storage: String,

        /// Access token for the storage (required for GRDM)
        #[arg(long)]
        token: Option<String>,

        /// Project id inside the storage (required for GRDM)
        #[arg(long)]
        id: Option<String>,

        /// Schema properties to keep, dotted from the root
        #[arg(long, num_args = 0..)]
        filter: Option<Vec<String>>,

        /// JSON file holding an array of properties to keep; wins over --filter
        #[arg(long)]
        filter_file: Option<PathBuf>,

        /// Write the result to this file instead of stdout; it must not exist
        #[arg(long)]
        file: Option<PathBuf>,

        /// Use the project metadata with this id instead of the newest one
        #[arg(long, conflicts_with = "project_metadata_title")]
        project_metadata_id: Option<String>,

        /// Use the newest project metadata with this title
        #[arg(long)]
        project_metadata_title: Option<String>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if is_reportable(&e) {
                eprintln!("error: {:#}", e);
            } else {
                eprintln!("error: {:?}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let settings = Settings::load(args.config.as_deref())?;
    let _guard = logging::init(&settings.log)?;

    match args.command {
        Commands::Get {
            schema,
            storage,
            token,
            id,
            filter,
            filter_file,
            file,
            project_metadata_id,
            project_metadata_title,
        } => {
            let filter = resolve_filter(filter, filter_file.as_deref())?;
            let project_metadata =
                project_metadata_selector(project_metadata_id, project_metadata_title);

            let manager = MetadataManager::new(settings);
            let metadata = manager.get_metadata(GetMetadataParams {
                schema,
                storage,
                token,
                project_id: id,
                filter,
                project_metadata,
            })?;

            match file {
                Some(path) => output::write_file(&metadata, &path)?,
                None => output::print(&metadata)?,
            }
        }
    }

    Ok(())
}

/// `--filter-file` wins over `--filter`. A bare `--filter` yields an empty
/// list, which is rejected later as naming no properties.
fn resolve_filter(
    filter: Option<Vec<String>>,
    filter_file: Option<&Path>,
) -> Result<Option<Vec<String>>> {
    match filter_file {
        Some(path) => Ok(Some(read_filter_file(path)?)),
        None => Ok(filter),
    }
}

fn project_metadata_selector(
    id: Option<String>,
    title: Option<String>,
) -> ProjectMetadataSelector {
    match (id, title) {
        (Some(id), _) => ProjectMetadataSelector::Id(id),
        (None, Some(title)) => ProjectMetadataSelector::Title(title),
        (None, None) => ProjectMetadataSelector::Newest,
    }
}

fn read_filter_file(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("could not read filter file {:?}", path))?;
    serde_json::from_str(&text)
        .with_context(|| format!("filter file {:?} is not a JSON array of strings", path))
}

// Errors the user can act on get a one-line message, anything else the full chain.
fn is_reportable(e: &anyhow::Error) -> bool {
    e.downcast_ref::<MetadataError>().is_some()
        || e.downcast_ref::<OutputError>().is_some()
        || e.downcast_ref::<io::Error>().is_some()
}
