use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use searchindex::persist::{load_any, save_searchindex, save_snapshot, IndexPaths, MetaFile, SNAPSHOT_VERSION};
use searchindex::{IndexBuilder, Language, SearchIndex, Searcher, SourceDoc, SourceObject};
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, inspect and query documentation search indexes (searchindex.js)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build searchindex.js from JSON/JSONL page files or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output searchindex.js path
        #[arg(long)]
        output: String,
        /// JSON array of documented objects to add
        #[arg(long)]
        objects: Option<String>,
        /// Search language (two-letter code)
        #[arg(long, default_value_t = Language::English)]
        language: Language,
    },
    /// Validate an index and print its counts
    Check {
        /// searchindex.js file or compiled snapshot directory
        index: String,
    },
    /// Print the documents a normalized term occurs in
    Lookup {
        index: String,
        term: String,
        /// Look in the title table instead of the body table
        #[arg(long, default_value_t = false)]
        title: bool,
    },
    /// Run a search query
    Query {
        index: String,
        text: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Print results as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
        #[arg(long, default_value_t = Language::English)]
        language: Language,
    },
    /// Compile searchindex.js into a binary snapshot directory
    Compile {
        index: String,
        #[arg(long)]
        output: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, objects, language } => {
            build_index(&input, &output, objects.as_deref(), language)
        }
        Commands::Check { index } => check(&index),
        Commands::Lookup { index, term, title } => lookup(&index, &term, title),
        Commands::Query { index, text, limit, json, language } => query(&index, &text, limit, json, language),
        Commands::Compile { index, output } => compile(&index, &output),
    }
}

fn build_index(input: &str, output: &str, objects: Option<&str>, language: Language) -> Result<()> {
    let input_path = Path::new(input);
    let mut builder = IndexBuilder::new(language);
    builder.set_env_version("searchindex", 1);

    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else {
        anyhow::bail!("input {input} does not exist");
    }

    for file in files {
        let docs = if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file)?
        } else {
            read_json(&file)?
        };
        for doc in docs {
            builder.feed(doc).with_context(|| format!("indexing {}", file.display()))?;
        }
    }

    if let Some(path) = objects {
        let f = File::open(path).with_context(|| format!("opening {path}"))?;
        let objects: Vec<SourceObject> = serde_json::from_reader(BufReader::new(f))?;
        tracing::info!(count = objects.len(), "adding objects");
        for object in objects {
            builder.add_object(object);
        }
    }

    tracing::info!(num_docs = builder.num_docs(), %language, "ingested documents");
    let index = builder.freeze();
    index.validate()?;
    save_searchindex(output, &index)?;
    tracing::info!(output, "index build complete");
    Ok(())
}

fn read_jsonl(file: &Path) -> Result<Vec<SourceDoc>> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let mut docs = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: SourceDoc = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), n + 1))?;
        docs.push(doc);
    }
    Ok(docs)
}

fn read_json(file: &Path) -> Result<Vec<SourceDoc>> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let docs = match json {
        serde_json::Value::Array(arr) => arr
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<SourceDoc>, _>>()?,
        serde_json::Value::Object(_) => vec![serde_json::from_value(json)?],
        _ => {
            tracing::warn!(file = %file.display(), "skipping file that is neither an object nor an array");
            Vec::new()
        }
    };
    Ok(docs)
}

fn open(index: &str) -> Result<SearchIndex> {
    load_any(index).with_context(|| format!("loading index {index}"))
}

fn check(index: &str) -> Result<()> {
    let idx = open(index)?;
    idx.validate()?;
    println!("documents:   {}", idx.num_docs());
    println!("terms:       {}", idx.num_terms());
    println!("title terms: {}", idx.title_terms().count());
    println!("objects:     {}", idx.objects().count());
    for (name, version) in idx.env_version() {
        println!("env {name} = {version}");
    }
    Ok(())
}

fn lookup(index: &str, term: &str, title: bool) -> Result<()> {
    let idx = open(index)?;
    let postings = if title { idx.title_lookup(term) } else { idx.lookup(term) };
    for doc in postings.iter() {
        println!("{doc}\t{}\t{}", idx.docname(doc).unwrap_or_default(), idx.title(doc).unwrap_or_default());
    }
    Ok(())
}

fn query(index: &str, text: &str, limit: usize, json: bool, language: Language) -> Result<()> {
    let searcher = Searcher::new(Arc::new(open(index)?), language);
    let hits: Vec<_> = searcher.query(text).into_iter().take(limit).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }
    for hit in hits {
        let location = format!("{}{}", hit.docname, hit.anchor);
        match &hit.description {
            Some(desc) => println!("{:>4}  {location}  {} ({desc})", hit.score, hit.title),
            None => println!("{:>4}  {location}  {}", hit.score, hit.title),
        }
    }
    Ok(())
}

fn compile(index: &str, output: &str) -> Result<()> {
    let idx = open(index)?;
    let meta = MetaFile {
        num_docs: idx.num_docs() as u32,
        num_terms: idx.num_terms() as u32,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "".into()),
        version: SNAPSHOT_VERSION,
        source: Some(index.to_string()),
    };
    save_snapshot(&IndexPaths::new(output), &idx, &meta)?;
    tracing::info!(output, num_docs = meta.num_docs, "snapshot written");
    Ok(())
}
