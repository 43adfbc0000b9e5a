//! `glossary` command-line front end.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dotenv::dotenv;
use serde::Serialize;
use glossary_backend::glossary::parse_candidates;
use glossary_backend::{Config, Glossary, GlossaryError, TermInput};

#[derive(Parser)]
#[command(name = "glossary")]
#[command(about = "Tagged glossary with fuzzy lookup")]
struct Cli {
    /// Database folder (overrides GLOSSARY_DATABASE_FOLDER)
    #[arg(long, value_name = "FOLDER", global = true)]
    database: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Add a term.
    Add {
        text: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Tag name, repeatable.
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },
    /// List every term sorted by text.
    List,
    /// Show one term.
    Get { id: i64 },
    /// Replace a term's text, description and tag set.
    Update {
        id: i64,
        text: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },
    /// Delete a term.
    Delete { id: i64 },
    /// List all tags, or the tags of one term.
    Tags {
        #[arg(long, value_name = "ID")]
        term: Option<i64>,
    },
    /// Attach a tag to a term.
    Attach { term_id: i64, name: String },
    /// Detach a tag from a term.
    Detach { term_id: i64, tag_id: i64 },
    /// Fuzzy text query, optionally restricted to terms carrying any of the tags.
    Query {
        #[arg(default_value = "")]
        text: String,
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },
    /// Import suggester candidates: a JSON array or a suggester response.
    Import {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Terms carrying a tag whose name contains the fragment.
    TagSearch { fragment: String },
}

#[derive(Serialize)]
struct Created {
    id: i64,
}

#[derive(Serialize)]
struct Deleted {
    id: i64,
}

#[derive(Serialize)]
struct Imported {
    ids: Vec<i64>,
}

#[derive(Serialize)]
struct Detached {
    removed: bool,
}

fn main() -> ExitCode {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(folder) = cli.database {
        config.database_folder = folder;
    }

    let glossary = match Glossary::from_config(&config) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&glossary, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(glossary: &Glossary, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Add {
            text,
            description,
            tags,
        } => {
            let id = glossary.add_term(&TermInput::new(text, description).with_tags(tags))?;
            print_json(&Created { id })
        }
        Commands::List => print_json(&glossary.list_terms()?),
        Commands::Get { id } => print_json(&glossary.get_term(id)?),
        Commands::Update {
            id,
            text,
            description,
            tags,
        } => {
            glossary.update_term(id, &TermInput::new(text, description).with_tags(tags))?;
            print_json(&glossary.get_term(id)?)
        }
        Commands::Delete { id } => {
            glossary.delete_term(id)?;
            print_json(&Deleted { id })
        }
        Commands::Tags { term } => match term {
            Some(id) => print_json(&glossary.tags_for_term(id)?),
            None => print_json(&glossary.list_tags()?),
        },
        Commands::Attach { term_id, name } => print_json(&glossary.attach_tag(term_id, &name)?),
        Commands::Detach { term_id, tag_id } => {
            let removed = glossary.detach_tag(term_id, tag_id)?;
            print_json(&Detached { removed })
        }
        Commands::Query { text, tags } => {
            let result = glossary.query(&text, &tags)?;
            if let Some(reason) = &result.degraded {
                eprintln!("Text matching unavailable ({}); showing tag matches only", reason);
            }
            print_json(&result)
        }
        Commands::Import { path } => {
            let raw = std::fs::read_to_string(&path)?;
            let candidates = parse_candidates(&raw)?;
            let ids = glossary.add_candidates(&candidates)?;
            print_json(&Imported { ids })
        }
        Commands::TagSearch { fragment } => print_json(&glossary.search_by_tag(&fragment)?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Glossary(#[from] GlossaryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
}
