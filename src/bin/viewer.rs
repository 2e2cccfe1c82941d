use anyhow::{Context, bail};
use clap::Parser;
use std::path::PathBuf;
use tensor_atlas::{GraphExplorer, LayeredLayoutEngine, ModelCatalog, ViewerConfig};

#[derive(Parser, Debug)]
#[command(name = "tensor-atlas-viewer")]
#[command(about = "Browse a catalog's operator graphs interactively", long_about = None)]
struct Args {
    /// Catalog JSON: a list of uploaded model entries, or one bare metadata object
    catalog: PathBuf,

    /// Model to open first, by file name. Defaults to the first catalog entry
    #[arg(short, long)]
    model: Option<String>,

    /// Viewer configuration JSON
    #[arg(short, long)]
    config: Option<PathBuf>,
}

struct ViewerApp {
    explorer: GraphExplorer<LayeredLayoutEngine>,
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            self.explorer.show(ui);
        });
    }
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
    let model = match args.model {
        Some(model) => model,
        None => match catalog.first() {
            Some(entry) => entry.file_name.clone(),
            None => bail!("catalog {} has no models", args.catalog.display()),
        },
    };

    let mut explorer = GraphExplorer::new(config, LayeredLayoutEngine, catalog);
    explorer.request_model(&model)?;
    let app = ViewerApp { explorer };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(format!("tensor-atlas: {}", args.catalog.display()))
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };
    eframe::run_native(
        "tensor-atlas-viewer",
        options,
        Box::new(|_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run viewer: {e}"))
}
