//! `folio` command line: format and inspect Markdown pages.
//!
//! Commands read a page file (optional `+++` TOML frontmatter, then a
//! Markdown body) and run it through the block codec. Output goes to the
//! writer passed to [`run`]; logs go to stderr.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use folio_client::FolioConfig;
use folio_client::constants::CONFIG_FILE_NAME;
use folio_editor::{decode, encode, page_file};
use folio_types::{Document, factory};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(about = "Format and inspect Folio Markdown pages")]
pub struct Cli {
    /// RON config file (default: ./folio.ron when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Normalise a page by decoding and re-encoding its body
    Fmt {
        file: PathBuf,
        /// Rewrite the file in place instead of printing
        #[arg(short, long)]
        write: bool,
    },
    /// Print the page's block tree as JSON
    Blocks { file: PathBuf },
    /// Print the page's headings as an indented outline
    Outline {
        file: PathBuf,
        /// Deepest heading level to include
        #[arg(long, default_value_t = 6)]
        depth: u8,
    },
    /// Print a new block of the given type as JSON
    New { kind: String },
}

/// Config from `path`, else `./folio.ron` if it exists, else defaults.
pub fn load_config(path: Option<&Path>) -> Result<FolioConfig> {
    if let Some(path) = path {
        return FolioConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()));
    }
    let local = Path::new(CONFIG_FILE_NAME);
    if local.exists() {
        debug!(path = %local.display(), "using local config");
        return FolioConfig::load(local).context("loading ./folio.ron");
    }
    Ok(FolioConfig::default())
}

pub fn run(command: Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Fmt { file, write } => {
            let text = read(&file)?;
            let formatted = format_page(&text)?;
            if write {
                if formatted != text {
                    std::fs::write(&file, &formatted)
                        .with_context(|| format!("writing {}", file.display()))?;
                    info!(file = %file.display(), "formatted");
                }
            } else {
                out.write_all(formatted.as_bytes())?;
            }
        }
        Command::Blocks { file } => {
            let doc = read_document(&file)?;
            serde_json::to_writer_pretty(&mut *out, &doc)?;
            writeln!(out)?;
        }
        Command::Outline { file, depth } => {
            let doc = read_document(&file)?;
            for entry in doc.outline(depth) {
                let indent = "  ".repeat(usize::from(entry.level.saturating_sub(1)));
                writeln!(out, "{indent}{}", entry.text)?;
            }
        }
        Command::New { kind } => {
            let block = factory::create_block_named(&kind)?;
            serde_json::to_writer_pretty(&mut *out, &block)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Re-encode the body, keeping any frontmatter block exactly as written.
pub fn format_page(text: &str) -> Result<String> {
    let (_, body) = page_file::split(text)?;
    let frontmatter = &text[..text.len() - body.len()];
    let mut formatted = String::with_capacity(text.len());
    formatted.push_str(frontmatter);
    formatted.push_str(&encode(&decode(body)));
    formatted.push('\n');
    Ok(formatted)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_document(path: &Path) -> Result<Document> {
    let text = read(path)?;
    let (_, body) = page_file::split(&text)?;
    Ok(decode(body))
}
