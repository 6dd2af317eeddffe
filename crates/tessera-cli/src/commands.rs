use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::json;
use tessera_grid::metadata::fields;
use tessera_grid::{BlobReader, Catalog, WriterOptions};
use tessera_store::{Filter, FindOptions, InMemoryDatabase, Sort};
use tessera_types::BlobKey;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::cli::*;
use crate::config::CliConfig;

/// Store, catalog and output settings for one invocation.
struct Session {
    db: InMemoryDatabase,
    catalog: Catalog,
    store_path: PathBuf,
    format: OutputFormat,
}

impl Session {
    fn open(config: &CliConfig, format: OutputFormat) -> anyhow::Result<Self> {
        let db = if config.store_path.exists() {
            InMemoryDatabase::load_from(&config.store_path)
                .with_context(|| format!("loading store {}", config.store_path.display()))?
        } else {
            InMemoryDatabase::new()
        };
        let catalog = Catalog::new(&db, config.catalog.clone())?;
        Ok(Self {
            db,
            catalog,
            store_path: config.store_path.clone(),
            format,
        })
    }

    fn save(&self) -> anyhow::Result<()> {
        self.db
            .save_to(&self.store_path)
            .with_context(|| format!("saving store {}", self.store_path.display()))
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::resolve(cli.config.as_deref(), cli.store, cli.bucket)?;
    let session = Session::open(&config, cli.format)?;
    match cli.command {
        Command::Put(args) => cmd_put(&session, args).await,
        Command::Get(args) => cmd_get(&session, args).await,
        Command::Fetch(args) => cmd_fetch(&session, args).await,
        Command::Ls(_) => cmd_ls(&session).await,
        Command::Versions(args) => cmd_versions(&session, args).await,
        Command::Rm(args) => cmd_rm(&session, args).await,
        Command::Exists(args) => cmd_exists(&session, args).await,
        Command::Verify(args) => cmd_verify(&session, args).await,
    }
}

async fn cmd_put(session: &Session, args: PutArgs) -> anyhow::Result<()> {
    let source = tokio::fs::File::open(&args.file)
        .await
        .with_context(|| format!("opening {}", args.file.display()))?;

    let filename = args
        .name
        .or_else(|| args.file.file_name().map(|n| n.to_string_lossy().into_owned()));
    let mut options = WriterOptions::new();
    if let Some(name) = filename {
        options = options.with_filename(name);
    }
    if let Some(content_type) = args.content_type {
        options = options.with_content_type(content_type);
    }
    if let Some(chunk_size) = args.chunk_size {
        options = options.with_chunk_size(chunk_size);
    }
    if let Some(key) = args.key {
        options = options.with_key(BlobKey::new(key)?);
    }
    for (name, value) in args.fields {
        options = options.with_field(name, value);
    }

    let key = session.catalog.put_reader(source, options).await?;
    session.save()?;

    let reader = session.catalog.get(&key).await?;
    match session.format {
        OutputFormat::Text => println!(
            "{} Stored {} ({} bytes)",
            "✓".green().bold(),
            key.to_string().yellow(),
            reader.length().unwrap_or(0)
        ),
        OutputFormat::Json => println!("{}", describe(&reader)),
    }
    Ok(())
}

async fn cmd_get(session: &Session, args: GetArgs) -> anyhow::Result<()> {
    let key = BlobKey::new(args.key)?;
    let mut reader = session.catalog.get(&key).await?;
    write_out(session, &mut reader, args.output.as_deref()).await
}

async fn cmd_fetch(session: &Session, args: FetchArgs) -> anyhow::Result<()> {
    let mut reader = session
        .catalog
        .get_version(Some(&args.name), args.version, Filter::all())
        .await?;
    write_out(session, &mut reader, args.output.as_deref()).await
}

async fn cmd_ls(session: &Session) -> anyhow::Result<()> {
    let names = session.catalog.list().await?;
    match session.format {
        OutputFormat::Json => println!("{}", json!(names)),
        OutputFormat::Text if names.is_empty() => println!("No blobs."),
        OutputFormat::Text => {
            for name in &names {
                println!("{name}");
            }
        }
    }
    Ok(())
}

async fn cmd_versions(session: &Session, args: VersionsArgs) -> anyhow::Result<()> {
    let options = FindOptions::default().with_sort(Sort::ascending(fields::UPLOAD_DATE));
    let readers = session
        .catalog
        .find(Filter::eq(fields::FILENAME, args.name.as_str()), options)
        .collect()
        .await?;

    match session.format {
        OutputFormat::Json => {
            let all: Vec<_> = readers.iter().map(describe).collect();
            println!("{}", json!(all));
        }
        OutputFormat::Text if readers.is_empty() => {
            println!("No versions of {}.", args.name.bold());
        }
        OutputFormat::Text => {
            for (index, reader) in readers.iter().enumerate() {
                let uploaded = reader
                    .upload_date()
                    .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!(
                    "{:>3}  {}  {:>10}  {}",
                    index,
                    reader.key().to_string().yellow(),
                    reader.length().unwrap_or(0),
                    uploaded.dimmed()
                );
            }
        }
    }
    Ok(())
}

async fn cmd_rm(session: &Session, args: RmArgs) -> anyhow::Result<()> {
    let key = BlobKey::new(args.key)?;
    let existed = session.catalog.exists(&key).await?;
    session.catalog.delete(&key).await?;
    session.save()?;
    match session.format {
        OutputFormat::Json => println!("{}", json!({ "key": key.as_str(), "deleted": existed })),
        OutputFormat::Text if existed => println!("Deleted {}", key.to_string().yellow()),
        OutputFormat::Text => println!("No blob {}; nothing to delete.", key.to_string().yellow()),
    }
    Ok(())
}

async fn cmd_exists(session: &Session, args: ExistsArgs) -> anyhow::Result<()> {
    let key = BlobKey::new(args.key)?;
    let exists = session.catalog.exists(&key).await?;
    match session.format {
        OutputFormat::Json => println!("{}", json!({ "key": key.as_str(), "exists": exists })),
        OutputFormat::Text => println!("{exists}"),
    }
    Ok(())
}

async fn cmd_verify(session: &Session, args: VerifyArgs) -> anyhow::Result<()> {
    let key = BlobKey::new(args.key)?;
    let report = session.catalog.verify(&key).await?;
    match session.format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "key": report.key.as_str(),
                "valid": report.is_valid(),
                "expected": report.expected,
                "actual": report.actual,
                "length": report.length,
            })
        ),
        OutputFormat::Text if report.is_valid() => println!(
            "{} {} checksum verified ({} bytes)",
            "✓".green().bold(),
            key.to_string().yellow(),
            report.length
        ),
        OutputFormat::Text => println!(
            "{} {} checksum mismatch\n  recorded: {}\n  stored:   {}",
            "✗".red().bold(),
            key.to_string().yellow(),
            report.expected.as_deref().unwrap_or("(none)"),
            report.actual
        ),
    }
    if !report.is_valid() {
        bail!("blob {key} failed verification");
    }
    Ok(())
}

/// Write a blob to `output`, or to stdout when `None`. A summary is printed
/// only when writing to a file. Blobs with stray trailing chunks are refused
/// before anything is written.
async fn write_out(
    session: &Session,
    reader: &mut BlobReader,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    reader.check_extra_chunks().await?;
    let Some(path) = output else {
        let mut stdout = tokio::io::stdout();
        copy_blob(reader, &mut stdout).await?;
        stdout.flush().await?;
        return Ok(());
    };

    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;
    let written = copy_blob(reader, &mut file).await?;
    file.flush().await?;
    match session.format {
        OutputFormat::Json => println!("{}", describe(reader)),
        OutputFormat::Text => println!(
            "{} Wrote {} bytes of {} to {}",
            "✓".green().bold(),
            written,
            reader.key().to_string().yellow(),
            path.display()
        ),
    }
    Ok(())
}

async fn copy_blob<W>(reader: &mut BlobReader, out: &mut W) -> anyhow::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    loop {
        let chunk = reader.read_chunk().await?;
        if chunk.is_empty() {
            break;
        }
        out.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    Ok(written)
}

fn describe(reader: &BlobReader) -> serde_json::Value {
    json!({
        "key": reader.key().as_str(),
        "filename": reader.filename(),
        "content_type": reader.content_type(),
        "length": reader.length(),
        "chunk_size": reader.chunk_size(),
        "upload_date": reader.upload_date().map(|d| d.to_rfc3339()),
        "checksum": reader.checksum(),
    })
}
