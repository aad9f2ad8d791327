// modelrepo - command-line client for the Digital Twin model repository

mod credentials;

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use modelrepo_client::{
    document_id, ClientConfig, RepositoryClient, RepositoryError, DEFAULT_PAGE_SIZE,
};
use modelrepo_core::{
    validate_model_id, ConnectionString, ModelContext, ModelKind, ModelUri, SharedAccessKey,
};
use tracing_subscriber::EnvFilter;

/// modelrepo - Digital Twin model repository tool
#[derive(Parser)]
#[command(name = "modelrepo")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Repository connection string (overrides stored credentials)
    #[arg(long, global = true, env = "MODELREPO_CONNECTION_STRING", hide_env_values = true)]
    connection_string: Option<String>,

    /// Repository base URL (defaults to https://<HostName>)
    #[arg(long, global = true, env = "MODELREPO_ENDPOINT")]
    endpoint: Option<String>,

    /// Read from the public repository only
    #[arg(long, global = true)]
    public: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a connection string, encrypted with a passphrase
    Login {
        /// Replace stored credentials
        #[arg(short, long)]
        force: bool,
    },
    /// Remove stored credentials
    Logout,
    /// Fetch a model
    Get {
        /// interface or capability-model
        kind: ModelKind,
        model_id: String,

        /// Inline referenced interfaces
        #[arg(long)]
        expand: bool,

        /// Write the document to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Download an interface, trying the private repository first
    Download {
        model_id: String,

        #[arg(short, long)]
        output: Option<String>,
    },
    /// Search models
    Search {
        kind: ModelKind,

        /// Matched against id, display name and description
        #[arg(default_value = "")]
        query: String,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,

        /// Token printed by a previous search
        #[arg(long)]
        continuation_token: Option<String>,

        /// Print the raw result page as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create or update a model from a JSON file
    Submit {
        kind: ModelKind,
        path: String,

        /// Etag of the version being replaced (looked up when omitted)
        #[arg(long)]
        etag: Option<String>,

        /// Tag to attach (can be specified multiple times)
        #[arg(short, long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },
    /// Delete a model from the private repository
    Delete { kind: ModelKind, model_id: String },
    /// Validate a model id and show its parts
    InspectId { id: String },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Login { force } => handle_login(cli.connection_string.as_deref(), force),
        Commands::Logout => handle_logout(),
        Commands::InspectId { ref id } => handle_inspect_id(id),
        Commands::Get {
            kind,
            ref model_id,
            expand,
            ref output,
        } => {
            let session = Session::open(&cli)?;
            let context = session.client.get_model(
                kind,
                model_id,
                session.read_scope(cli.public),
                expand,
            )?;
            write_document(&context.content, output.as_deref())
        }
        Commands::Download {
            ref model_id,
            ref output,
        } => {
            let session = Session::open(&cli)?;
            let context = session.client.download_with_fallback(
                ModelKind::Interface,
                model_id,
                session.read_scope(cli.public),
                false,
            )?;
            let source = match context.repository_id {
                Some(ref id) => format!("private repository '{}'", id),
                None => "public repository".to_string(),
            };
            eprintln!("{} {} from {}", "✓".green().bold(), context.model_id, source);
            write_document(&context.content, output.as_deref())
        }
        Commands::Search {
            kind,
            ref query,
            page_size,
            ref continuation_token,
            json,
        } => {
            let session = Session::open(&cli)?;
            handle_search(
                &session,
                cli.public,
                kind,
                query,
                page_size,
                continuation_token.as_deref(),
                json,
            )
        }
        Commands::Submit {
            kind,
            ref path,
            ref etag,
            ref tags,
        } => {
            let session = Session::open(&cli)?;
            handle_submit(&session, kind, path, etag.as_deref(), tags)
        }
        Commands::Delete { kind, ref model_id } => {
            let session = Session::open(&cli)?;
            let repository_id = session.write_scope()?;
            session.client.delete(kind, model_id, Some(repository_id))?;
            println!("{} Deleted {}", "✓".green().bold(), model_id);
            Ok(())
        }
    }
}

/// A client plus the private repository it may address.
struct Session {
    client: RepositoryClient,
    repository_id: Option<String>,
}

impl Session {
    /// Resolves credentials: flag or environment, then the stored file,
    /// then anonymous.
    fn open(cli: &Cli) -> Result<Self> {
        let cs = match cli.connection_string {
            Some(ref raw) => {
                Some(ConnectionString::parse(raw).context("Invalid connection string")?)
            }
            None => stored_connection_string()?,
        };
        Self::new(cs.as_ref(), cli.endpoint.as_deref())
    }

    /// Key fields are optional: without them the repository id is kept but
    /// private calls fail in the client, and public reads still work.
    fn new(cs: Option<&ConnectionString>, endpoint: Option<&str>) -> Result<Self> {
        let config = match (endpoint, cs) {
            (Some(endpoint), _) => ClientConfig::new(endpoint),
            (None, Some(cs)) => ClientConfig::for_host(cs.host_name()),
            (None, None) => ClientConfig::from_env(),
        };

        let signed = cs.filter(|cs| {
            cs.shared_access_key_name().is_some() && cs.shared_access_key().is_some()
        });
        let credentials = match signed {
            Some(cs) => Some(SharedAccessKey::from_connection_string(cs)?),
            None => None,
        };
        let repository_id = cs.map(|cs| cs.repository_id().to_string());
        tracing::debug!(
            endpoint = %config.endpoint,
            ?repository_id,
            signed = credentials.is_some(),
            "session opened"
        );

        Ok(Session {
            client: RepositoryClient::new(config, credentials),
            repository_id,
        })
    }

    fn read_scope(&self, public: bool) -> Option<&str> {
        if public {
            None
        } else {
            self.repository_id.as_deref()
        }
    }

    fn write_scope(&self) -> Result<&str> {
        self.repository_id.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "Writing requires a private repository. Run `modelrepo login` or pass --connection-string."
            )
        })
    }
}

fn stored_connection_string() -> Result<Option<ConnectionString>> {
    let path = credentials::default_path()?;
    if !path.exists() {
        return Ok(None);
    }
    let passphrase = credentials::passphrase(false)?;
    credentials::load(&path, &passphrase).map(Some)
}

fn handle_login(connection_string: Option<&str>, force: bool) -> Result<()> {
    let raw = match connection_string {
        Some(raw) => raw.to_string(),
        None => rpassword::prompt_password("Connection string: ")
            .context("Failed to read connection string")?,
    };
    let cs = ConnectionString::parse(&raw).context("Invalid connection string")?;
    SharedAccessKey::from_connection_string(&cs)?;

    let path = credentials::default_path()?;
    if path.exists() && !force {
        bail!(
            "Credentials already stored at {}. Use --force to replace them.",
            path.display()
        );
    }
    let passphrase = credentials::passphrase(true)?;
    credentials::save(&path, &cs, &passphrase, force)?;

    println!("{} Credentials stored", "✓".green().bold());
    println!();
    println!("  Repository: {}", cs.repository_id());
    println!("  Host:       {}", cs.host_name());
    println!("  File:       {}", path.display());
    Ok(())
}

fn handle_logout() -> Result<()> {
    let path = credentials::default_path()?;
    if credentials::remove(&path)? {
        println!("{} Removed {}", "✓".green().bold(), path.display());
    } else {
        println!("No stored credentials at {}", path.display());
    }
    Ok(())
}

fn handle_search(
    session: &Session,
    public: bool,
    kind: ModelKind,
    query: &str,
    page_size: u32,
    continuation_token: Option<&str>,
    json: bool,
) -> Result<()> {
    let page = session.client.search(
        kind,
        query,
        continuation_token,
        session.read_scope(public),
        page_size,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.results.is_empty() {
        println!("No {} models match '{}'", kind, query);
    }
    for hit in &page.results {
        let status = if hit.published {
            "published".green()
        } else {
            "draft".yellow()
        };
        println!("{}  [{}]", hit.model_id.bold(), status);
        if let Some(ref name) = hit.display_name {
            println!("    {}", name);
        }
        if let Some(ref description) = hit.description {
            println!("    {}", description.dimmed());
        }
    }
    if let Some(ref token) = page.continuation_token {
        println!();
        println!("More results: --continuation-token {}", token);
    }
    Ok(())
}

fn handle_submit(
    session: &Session,
    kind: ModelKind,
    path: &str,
    etag: Option<&str>,
    tags: &[String],
) -> Result<()> {
    let repository_id = session.write_scope()?;
    let content = std::fs::read_to_string(Path::new(path))
        .with_context(|| format!("Failed to read '{}'", path))?;
    let model_id =
        document_id(kind, &content).with_context(|| format!("Invalid model file '{}'", path))?;

    let existing = session.client.get_model(kind, &model_id, Some(repository_id), false);
    let etag = submit_etag(&model_id, existing, etag)?;

    let context = session.client.create_or_update_with_tags(
        kind,
        &content,
        etag.as_deref(),
        Some(repository_id),
        tags,
    )?;

    println!("{} Submitted {}", "✓".green().bold(), context.model_id);
    if let Some(ref resource_id) = context.resource_id {
        println!("  Resource: {}", resource_id);
    }
    if let Some(ref etag) = context.etag {
        println!("  Etag:     {}", etag);
    }
    Ok(())
}

/// Etag to submit with, given the lookup of the current version.
///
/// Published models are refused whether or not an etag was passed. An
/// explicit etag wins over the looked-up one.
fn submit_etag(
    model_id: &str,
    existing: std::result::Result<ModelContext, RepositoryError>,
    etag: Option<&str>,
) -> Result<Option<String>> {
    let current = match existing {
        Ok(existing) if existing.is_published() => {
            bail!("{} is published and can no longer be changed", model_id)
        }
        Ok(existing) => existing.etag,
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };
    Ok(etag.map(str::to_string).or(current))
}

fn handle_inspect_id(id: &str) -> Result<()> {
    validate_model_id(id)?;
    match ModelUri::parse(id) {
        Ok(uri) => {
            println!("{} {}", "✓".green().bold(), uri);
            println!();
            println!("  Namespace: {}", uri.namespace());
            println!("  Name:      {}", uri.name());
            println!("  Version:   {}", uri.version());
        }
        Err(e) => {
            println!("{} {} is a valid repository id", "✓".green().bold(), id);
            println!("  {}", format!("Not a namespace/name/version path: {}", e).dimmed());
        }
    }
    Ok(())
}

fn write_document(content: &str, output: Option<&str>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("Failed to write '{}'", path))?;
            eprintln!("Written to: {}", path);
        }
        None => println!("{}", content),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_submit_with_tags() {
        let cli = Cli::try_parse_from([
            "modelrepo", "submit", "interface", "model.json", "--tag", "a", "--tag", "b",
        ])
        .unwrap();
        match cli.command {
            Commands::Submit { kind, tags, etag, .. } => {
                assert_eq!(kind, ModelKind::Interface);
                assert_eq!(tags, vec!["a", "b"]);
                assert_eq!(etag, None);
            }
            _ => panic!("expected submit"),
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(Cli::try_parse_from(["modelrepo", "get", "telemetry", "urn:a:b:1"]).is_err());
    }

    fn existing(published: bool, etag: &str) -> ModelContext {
        ModelContext {
            model_id: "urn:a:B:1".to_string(),
            kind: ModelKind::Interface,
            resource_id: None,
            content: "{}".to_string(),
            published: Some(published),
            etag: Some(etag.to_string()),
            tags: vec![],
            repository_id: Some("r1".to_string()),
        }
    }

    fn not_found() -> RepositoryError {
        RepositoryError::Status {
            method: "GET".to_string(),
            url: "https://repo.example.com/Models".to_string(),
            status: 404,
            body: String::new(),
        }
    }

    #[test]
    fn test_session_without_key_fields_reads_public() {
        let cli = Cli::try_parse_from([
            "modelrepo",
            "--public",
            "--connection-string",
            "HostName=repo.example.com;RepositoryId=r1",
            "get",
            "interface",
            "urn:a:B:1",
        ])
        .unwrap();

        let session = Session::open(&cli).unwrap();
        assert!(session.client.credentials().is_none());
        assert_eq!(session.client.config().endpoint, "https://repo.example.com");
        assert_eq!(session.read_scope(true), None);
        assert_eq!(session.read_scope(false), Some("r1"));
    }

    #[test]
    fn test_session_with_key_fields_signs() {
        let cs = ConnectionString::parse(
            "HostName=repo.example.com;RepositoryId=r1;SharedAccessKeyName=owner;SharedAccessKey=c2VjcmV0",
        )
        .unwrap();
        let session = Session::new(Some(&cs), Some("http://127.0.0.1:8080")).unwrap();

        assert_eq!(session.client.credentials().unwrap().repository_id(), "r1");
        assert_eq!(session.client.config().endpoint, "http://127.0.0.1:8080");
        assert_eq!(session.write_scope().unwrap(), "r1");
    }

    #[test]
    fn test_submit_refuses_published_even_with_etag() {
        let result = submit_etag("urn:a:B:1", Ok(existing(true, "e1")), Some("e1"));
        assert!(result.unwrap_err().to_string().contains("published"));

        assert!(submit_etag("urn:a:B:1", Ok(existing(true, "e1")), None).is_err());
    }

    #[test]
    fn test_submit_etag_resolution() {
        assert_eq!(
            submit_etag("urn:a:B:1", Ok(existing(false, "current")), None).unwrap(),
            Some("current".to_string())
        );
        assert_eq!(
            submit_etag("urn:a:B:1", Ok(existing(false, "current")), Some("mine")).unwrap(),
            Some("mine".to_string())
        );
        assert_eq!(submit_etag("urn:a:B:1", Err(not_found()), None).unwrap(), None);
        assert!(submit_etag(
            "urn:a:B:1",
            Err(RepositoryError::Transport("down".to_string())),
            None
        )
        .is_err());
    }
}
