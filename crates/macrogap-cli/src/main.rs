//! macrogap: recipe suggestions that fill the remaining macro gap of the day.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{App, RecommendArgs};

#[derive(Parser)]
#[command(name = "macrogap")]
#[command(about = "Recipe retrieval and ranking with generative and heuristic fallback")]
struct Cli {
    /// Data directory (defaults to $MACROGAP_DATA_DIR, then ./data)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Suggest recipes for a free-text request
    Recommend(RecommendArgs),
    /// Embed every catalog recipe that has no cached vector
    Index {
        /// Recompute vectors that already exist
        #[arg(long)]
        force: bool,
    },
    /// Catalog, food and embedding counts plus active capabilities
    Stats,
    /// Load foods (per-100 g nutrients) from a JSON array
    ImportFoods { file: PathBuf },
    /// Load recipes from a JSON array
    ImportRecipes { file: PathBuf },
    /// Drop every cached recipe vector
    ClearEmbeddings,
}

fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var("MACROGAP_DATA_DIR").ok().map(PathBuf::from))
        .unwrap_or_else(|| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays pure JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir);
    info!("Data directory: {}", data_dir.display());

    let app = App::open(&data_dir)?;

    match cli.command {
        Command::Recommend(args) => {
            let code = app.recommend(&args)?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Command::Index { force } => app.index(force)?,
        Command::Stats => app.stats()?,
        Command::ImportFoods { file } => app.import_foods(&file)?,
        Command::ImportRecipes { file } => app.import_recipes(&file)?,
        Command::ClearEmbeddings => app.clear_embeddings()?,
    }

    Ok(())
}
