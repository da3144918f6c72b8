use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use gridstore::{
    Config, DownloadOptions, FileFilter, FindOptions, GridStore, GridStoreError, MetadataValue,
    MongoConnection, SortDirection, WriteOptions,
};

/// Manage files stored in a MongoDB GridFS bucket.
#[derive(Parser, Debug)]
#[command(name = "gridstore", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(
        long,
        short,
        env = "GRIDSTORE_CONFIG",
        default_value = "gridstore.toml",
        global = true
    )]
    config: PathBuf,

    /// Bucket to operate on (overrides the configuration).
    #[arg(long, global = true)]
    bucket: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stored files.
    Ls(LsArgs),
    /// Write a stored file's content to stdout.
    Cat {
        /// File identifier.
        id: String,
    },
    /// Download a stored file to a local path.
    Get(GetArgs),
    /// Upload a local file.
    Put(PutArgs),
    /// Rename a stored file.
    Mv {
        /// File identifier.
        id: String,
        /// New filename.
        filename: String,
    },
    /// Delete a stored file.
    Rm {
        /// File identifier.
        id: String,
    },
}

#[derive(Args, Debug)]
struct LsArgs {
    /// Only list files with this filename.
    #[arg(long)]
    filename: Option<String>,
    /// Maximum number of files to list.
    #[arg(long)]
    limit: Option<u64>,
    /// Print records as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct GetArgs {
    /// File identifier.
    id: String,
    /// Local filename to write.
    #[arg(long, conflicts_with = "from_record")]
    name: Option<String>,
    /// Name the local file after the record.
    #[arg(long)]
    from_record: bool,
    /// Directory to write into (defaults to the system temp dir).
    #[arg(long)]
    dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PutArgs {
    /// Local file to upload.
    path: PathBuf,
    /// Filename to record (defaults to the local file name).
    #[arg(long)]
    filename: Option<String>,
    /// Content type (guessed from the extension when omitted).
    #[arg(long)]
    content_type: Option<String>,
    /// Alternate name; may be repeated.
    #[arg(long = "alias")]
    aliases: Vec<String>,
    /// Metadata as a JSON object.
    #[arg(long)]
    metadata: Option<String>,
    /// Chunk size in bytes.
    #[arg(long)]
    chunk_size: Option<u32>,
    /// Remove the local file after the upload attempt.
    #[arg(long)]
    remove: bool,
}

fn load_config(cli: &Cli) -> Result<Config, GridStoreError> {
    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(GridStoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Config::default()
        }
        Err(e) => return Err(e),
    };
    config.apply_env_overrides();
    if let Some(bucket) = &cli.bucket {
        config.store.bucket = bucket.clone();
    }
    config.validate()?;
    Ok(config)
}

fn write_options(args: &PutArgs) -> Result<WriteOptions, GridStoreError> {
    let filename = match &args.filename {
        Some(name) => name.clone(),
        None => args
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                GridStoreError::Validation(format!("{:?} has no file name", args.path))
            })?,
    };

    let mut options = WriteOptions::new(filename);
    options.chunk_size = args.chunk_size;
    options.aliases = args.aliases.clone();
    options.content_type = args.content_type.clone().or_else(|| {
        mime_guess::from_path(&args.path)
            .first_raw()
            .map(str::to_string)
    });

    if let Some(raw) = &args.metadata {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| GridStoreError::Validation(format!("metadata is not JSON: {e}")))?;
        match MetadataValue::from(value) {
            MetadataValue::Document(map) => options.metadata = map,
            _ => {
                return Err(GridStoreError::Validation(
                    "metadata must be a JSON object".to_string(),
                ))
            }
        }
    }

    Ok(options)
}

async fn run(cli: Cli) -> Result<(), GridStoreError> {
    let config = load_config(&cli)?;
    let connection = MongoConnection::connect(&config.store).await?;
    let store = GridStore::with_bucket(connection, config.store.bucket.clone());

    match cli.command {
        Command::Ls(args) => {
            let filter = args
                .filename
                .map(FileFilter::filename)
                .unwrap_or_default();
            let mut options = FindOptions::new().sort_by("uploadDate", SortDirection::Ascending);
            options.limit = args.limit;

            let records = store.find_with_options(&filter, &options).await?;
            if args.json {
                let json = serde_json::to_string_pretty(&records)
                    .map_err(|e| GridStoreError::Validation(e.to_string()))?;
                println!("{json}");
            } else {
                for record in records {
                    println!(
                        "{}  {:>12}  {}  {}",
                        record.id,
                        record.length,
                        record.upload_date.format("%Y-%m-%d %H:%M:%S"),
                        record.filename
                    );
                }
            }
        }
        Command::Cat { id } => {
            let mut stream = store.read_file_stream(&id).await?;
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut stream, &mut stdout)
                .await
                .map_err(GridStoreError::Transfer)?;
        }
        Command::Get(args) => {
            let mut options = DownloadOptions::new();
            if let Some(name) = args.name {
                options = options.named(name);
            } else if args.from_record {
                options = options.from_record();
            }
            if let Some(dir) = args.dir {
                options = options.in_dir(dir);
            }

            let path = store.download_file(&args.id, &options).await?;
            println!("{}", path.display());
        }
        Command::Put(args) => {
            let options = write_options(&args)?;
            let record = store.upload_file(&args.path, &options, args.remove).await?;
            println!("{}", record.id);
        }
        Command::Mv { id, filename } => {
            store.rename(&id, &filename).await?;
        }
        Command::Rm { id } => {
            store.delete(&id).await?;
            info!("Removed {}", id);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging comes up before the config is validated so load errors are visible.
    let logging = Config::load(&cli.config)
        .map(|c| c.logging)
        .unwrap_or_default();
    if let Err(e) = gridstore::logging::init(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        gridstore::logging::init_console_only(&logging.level);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("gridstore: {e}");
            ExitCode::FAILURE
        }
    }
}
