use anyhow::Result;
use clap::{Parser, Subcommand};
use csidx::context::{Context, SearchOptions, DEFAULT_MAX_RESULTS};
use csidx::server;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "csidx")]
#[command(about = "Trigram code search toolkit (cindex/csearch wrapper)")]
struct Cli {
    /// Store directory holding the index files (default: ~/.csidx)
    #[arg(long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index one or more directory trees
    Index {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Search the indexed trees with a regular expression
    Search {
        pattern: String,

        /// Case insensitive search
        #[arg(short = 'i', long)]
        ignore_case: bool,

        /// Only search files whose path matches this regex
        #[arg(short = 'f', long)]
        path_filter: Option<String>,

        /// Maximum results
        #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_RESULTS)]
        max_results: usize,
    },
    /// List every path currently indexed
    List,
    /// List the index files in the store
    Indices,
    /// Remove paths and their descendants from every index file
    Prune {
        #[arg(required = true)]
        paths: Vec<String>,

        /// Treat the arguments as exact file names instead of path prefixes
        #[arg(long)]
        files: bool,
    },
    /// Remove every index file from the store
    Clear,
    /// Serve the JSON HTTP API
    Serve {
        /// Address to listen on
        #[arg(long, default_value = server::DEFAULT_BIND)]
        listen: SocketAddr,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let ctx = match cli.store {
        Some(store) => Context::new(store)?,
        None => Context::open_default()?,
    };

    match cli.command {
        Commands::Index { paths } => {
            let flags = ctx.index_all(&paths)?;
            if flags.iter().any(|&ok| !ok) {
                anyhow::bail!("indexer reported failure");
            }
            println!("indexed {} path group(s)", flags.len());
        }
        Commands::Search {
            pattern,
            ignore_case,
            path_filter,
            max_results,
        } => {
            let options = SearchOptions {
                ignore_case,
                path_filter,
                max_results,
            };
            for hit in ctx.search(&pattern, &options)? {
                println!("{}:{}:{}", hit.file.display(), hit.line, hit.text);
            }
        }
        Commands::List => {
            for path in ctx.paths_indexed()? {
                println!("{}", path);
            }
        }
        Commands::Indices => {
            for file in ctx.indices()? {
                println!("{}", file.display());
            }
        }
        Commands::Prune { paths, files } => {
            let raw: Vec<Vec<u8>> = paths.into_iter().map(String::into_bytes).collect();
            if files {
                ctx.prune_files(&raw)?;
            } else {
                ctx.prune_paths(&raw)?;
            }
        }
        Commands::Clear => {
            ctx.clear_indices()?;
        }
        Commands::Serve { listen } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(server::serve(Arc::new(ctx), listen))?;
        }
    }

    Ok(())
}
