use anyhow::{Context, bail};
use clap::Parser;
use std::path::PathBuf;
use tensor_atlas::{GraphDisplay, GraphExplorer, LayeredLayoutEngine, ModelCatalog, ViewerConfig};

#[derive(Parser, Debug)]
#[command(name = "tensor-atlas")]
#[command(about = "Lay out a model's operator graph from its layer metadata", long_about = None)]
struct Args {
    /// Catalog JSON: a list of uploaded model entries, or one bare metadata object
    catalog: PathBuf,

    /// Model to lay out, by file name. Defaults to the first catalog entry
    #[arg(short, long)]
    model: Option<String>,

    /// Viewer configuration JSON
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the positioned graph here as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List the catalog and exit
    #[arg(long)]
    list: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ViewerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ViewerConfig::default(),
    };
    let catalog = ModelCatalog::load(&args.catalog)
        .with_context(|| format!("loading catalog {}", args.catalog.display()))?;

    if args.list {
        for entry in catalog.entries() {
            println!(
                "{}\t{}\t{} layers\t{}",
                entry.id,
                entry.file_name,
                entry.metadata_json.layers.len(),
                entry.uploaded_at.as_deref().unwrap_or("-")
            );
        }
        return Ok(());
    }

    let model = match args.model {
        Some(model) => model,
        None => match catalog.first() {
            Some(entry) => entry.file_name.clone(),
            None => bail!("catalog {} has no models", args.catalog.display()),
        },
    };

    let mut explorer = GraphExplorer::new(config, LayeredLayoutEngine, catalog);
    let layout = match explorer.load_blocking(&model)? {
        GraphDisplay::Ready(layout) => layout,
        GraphDisplay::EmptyGraph => {
            println!("{model}: no nodes found in the model graph");
            return Ok(());
        }
        GraphDisplay::Failed(err) => bail!("{model}: {err}"),
        GraphDisplay::Idle => bail!("{model}: layout was not committed"),
    };

    println!("{model}: {}", layout.summary());
    if let Some(bounds) = layout.bounding_rect() {
        println!(
            "bounds: ({:.1}, {:.1}) to ({:.1}, {:.1})",
            bounds.min.x, bounds.min.y, bounds.max.x, bounds.max.y
        );
    }
    for node in &layout.nodes {
        log::debug!(
            "{} [{}] at ({:.1}, {:.1}) size {}x{}",
            node.id(),
            node.node.type_name(),
            node.x,
            node.y,
            node.node.width,
            node.node.height
        );
    }

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(layout)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        log::info!("Wrote positioned graph to {}", path.display());
    }
    Ok(())
}
