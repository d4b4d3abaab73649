use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::{Rgb, RgbImage, imageops};
use log::info;

use folioview::backend::{MupdfBackend, POINTS_PER_INCH};
use folioview::clock::SystemClock;
use folioview::controller::{ControllerConfig, ViewportController};
use folioview::geometry::{Point, Size};
use folioview::renderer::{RasterFrame, RenderOutcome, Surface};
use folioview::store::PersistentStateStore;
use folioview::{logging, panic_handler, settings};

#[derive(Parser)]
#[command(name = "folioview", about = "Headless PDF viewport renderer", version)]
struct Cli {
    /// Log level written to folioview.log
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// View state file (overrides `data_path` from the configuration)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the visible region of a document to a PNG
    Render {
        file: PathBuf,

        /// Page index (0-based); defaults to the stored page
        #[arg(long)]
        page: Option<usize>,

        #[arg(long)]
        zoom: Option<f32>,

        /// Rotation in degrees (0, 90, 180 or 270)
        #[arg(long)]
        rotation: Option<i64>,

        /// Viewport size in pixels
        #[arg(long, default_value = "800x600", value_parser = parse_viewport)]
        viewport: Size,

        /// Horizontal scroll offset in page units
        #[arg(long)]
        scroll_x: Option<f32>,

        /// Vertical scroll offset in page units
        #[arg(long)]
        scroll_y: Option<f32>,

        /// Output PNG
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Show page count and the stored view state of a document
    Info { file: PathBuf },

    /// List stored view states, most recently created first; `*` marks the
    /// last document opened
    List,
}

fn parse_viewport(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{s}`"))?;
    let w: f32 = w.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let h: f32 = h.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    if w <= 0.0 || h <= 0.0 {
        return Err("viewport must be non-empty".to_string());
    }
    Ok(Size::new(w, h))
}

/// Composites rasters into a viewport-sized image.
struct PngSurface {
    canvas: RgbImage,
    /// Raster pixels per viewport pixel.
    density: f32,
}

impl PngSurface {
    fn new(viewport: Size, base_dpi: f32) -> Self {
        let density = base_dpi / POINTS_PER_INCH;
        let width = (viewport.width * density).round() as u32;
        let height = (viewport.height * density).round() as u32;
        Self {
            canvas: RgbImage::from_pixel(width, height, Rgb([128, 128, 128])),
            density,
        }
    }
}

impl Surface for PngSurface {
    fn draw_raster(&mut self, frame: RasterFrame) {
        let Point { x, y } = frame.position;
        imageops::overlay(
            &mut self.canvas,
            &frame.image,
            (x * self.density).round() as i64,
            (y * self.density).round() as i64,
        );
    }
}

fn open_store(data: Option<&Path>) -> PersistentStateStore {
    let path = data.map(Path::to_path_buf).or_else(settings::get_data_path);
    PersistentStateStore::load_or_ephemeral(path.as_deref())
}

#[allow(clippy::too_many_arguments)]
fn render(
    store: &mut PersistentStateStore,
    file: &Path,
    page: Option<usize>,
    zoom: Option<f32>,
    rotation: Option<i64>,
    viewport: Size,
    scroll: (Option<f32>, Option<f32>),
    out: &Path,
) -> Result<()> {
    let settings = settings::current();
    let config = ControllerConfig {
        viewport,
        ..ControllerConfig::from(&settings)
    };

    let state = store.find_or_create(file);
    let mut controller = ViewportController::new(state, config, Rc::new(SystemClock));
    let opened = controller.open(&MupdfBackend);
    // Persist the missing flag before bailing out.
    if opened.is_err() {
        store.save_if_dirty();
    }
    opened?;

    if let Some(zoom) = zoom {
        controller.set_zoom(zoom)?;
    }
    if let Some(degrees) = rotation {
        controller.set_rotation_degrees(degrees)?;
    }
    if let Some(page) = page {
        controller.set_page(page)?;
    }
    if scroll.0.is_some() || scroll.1.is_some() {
        let (x, y) = controller.scroll_pos();
        controller.scroll_to(scroll.0.unwrap_or(x), scroll.1.unwrap_or(y))?;
    }

    let mut surface = PngSurface::new(viewport, settings.render_config().base_dpi);
    let outcome = controller.render_now(&mut surface)?;
    surface
        .canvas
        .save(out)
        .with_context(|| format!("writing {}", out.display()))?;

    let (sx, sy) = controller.scroll_pos();
    println!(
        "page {}  zoom {:.2}  rotation {}  scroll ({sx:.1}, {sy:.1})",
        controller.page_label(),
        controller.zoom(),
        controller.rotation().degrees(),
    );
    if let RenderOutcome::Rendered(region) = outcome {
        println!(
            "rendered region ({:.1}, {:.1})-({:.1}, {:.1}) -> {}",
            region.x0,
            region.y0,
            region.x1,
            region.y1,
            out.display()
        );
    }

    controller.close();
    store.save()?;
    Ok(())
}

fn show_info(store: &mut PersistentStateStore, file: &Path) -> Result<()> {
    let state = store.find_or_create(file);
    let mut controller =
        ViewportController::new(state, ControllerConfig::default(), Rc::new(SystemClock));
    controller.open(&MupdfBackend)?;

    println!("{}", controller.file_path().display());
    println!("pages: {}", controller.total_pages());
    if let Some(size) = controller.current_page_size() {
        println!(
            "current page: {} ({:.0} x {:.0} pt)",
            controller.page_label(),
            size.width,
            size.height
        );
    }
    let record = controller.state().borrow().to_value();
    println!("{}", serde_json::to_string_pretty(&record)?);

    controller.close();
    store.save()?;
    Ok(())
}

fn list_states(store: &PersistentStateStore) {
    if store.is_empty() {
        println!("no stored view states");
        return;
    }
    let latest = store.most_recent();
    for handle in store.file_states() {
        let marker = if latest.as_ref().is_some_and(|l| Rc::ptr_eq(l, handle)) {
            "* "
        } else {
            "  "
        };
        let state = handle.borrow();
        let last_opened = state
            .last_opened()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{marker}{}{}  page {}  zoom {:.2}  rot {}  opened {}x  last {}",
            state.file_path().display(),
            if state.is_missing { " (missing)" } else { "" },
            state.page_no() + 1,
            state.zoom(),
            state.rotation().degrees(),
            state.open_count(),
            last_opened,
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = logging::parse_level(&cli.log_level)?;
    logging::init_file_logger(level, &logging::default_log_path())
        .context("initializing logger")?;
    panic_handler::initialize_panic_handler();

    match &cli.config {
        Some(path) => settings::load_settings_from_path(path),
        None => settings::load_settings(),
    }
    info!("Starting folioview");

    let mut store = open_store(cli.data.as_deref());
    match cli.command {
        Commands::Render {
            file,
            page,
            zoom,
            rotation,
            viewport,
            scroll_x,
            scroll_y,
            out,
        } => render(
            &mut store,
            &file,
            page,
            zoom,
            rotation,
            viewport,
            (scroll_x, scroll_y),
            &out,
        )?,
        Commands::Info { file } => show_info(&mut store, &file)?,
        Commands::List => list_states(&store),
    }

    info!("Shutting down folioview");
    Ok(())
}
