use clap::{ArgGroup, Parser, Subcommand};
use folio::cleanup::{self, CleanupOptions};
use folio::config::{self, SiteConfig, SitePaths};
use folio::document;
use folio::imaging::RustBackend;
use folio::import::{self, ImportOptions, Importer};
use folio::layout::{self, LayoutConfig};
use folio::reorder::{self, ReorderSession, SessionEnd};
use folio::sync::{self, RenameOverride};
use folio::types::{Album, Photo};
use folio::{analysis, output};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Shared flag for commands that can preview their plan.
#[derive(clap::Args, Clone)]
struct DryRunArgs {
    /// Show what would change without writing anything
    #[arg(long)]
    dry_run: bool,
}

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Keep a photo portfolio's albums.json in step with its album directories")]
#[command(long_about = "\
Keep a photo portfolio's albums.json in step with its album directories

Site structure:

  site/
  ├── folio.toml                   # Config (optional, see 'folio gen-config')
  ├── albums.json                  # Document served to the browser
  ├── albums/                      # Source images, one directory per album
  │   ├── street/
  │   │   └── IMG_0042.jpg
  │   └── japan-trip/
  ├── thumbnails/                  # Generated: thumbnails/<album>/<id>.jpg
  └── full/                        # Generated: full/<album>/<id>.jpg

Typical flow:
  folio import          add new images (thumbnails, EXIF, AI alt text)
  folio sync            carry data over when an album directory is renamed
  folio cleanup         drop entries whose source images are gone
  folio reorder ALBUM   hand-order an album

Set RUST_LOG=debug for diagnostics.")]
#[command(version)]
struct Cli {
    /// Site root holding albums.json and albums/
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file [default: <root>/folio.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import new images from album directories
    Import {
        /// Only this album directory
        album: Option<String>,
        /// Skip scene analysis; photos get the fallback alt text
        #[arg(long)]
        no_ai: bool,
    },
    /// Detect renamed album directories and update the document
    Sync {
        #[command(flatten)]
        dry_run: DryRunArgs,
        /// Resolve a rename explicitly (repeatable)
        #[arg(long = "rename", value_name = "OLD=NEW")]
        renames: Vec<RenameOverride>,
    },
    /// Remove entries whose source images are gone
    Cleanup {
        #[command(flatten)]
        dry_run: DryRunArgs,
        /// Do not ask for confirmation
        #[arg(long, short)]
        yes: bool,
        /// Clean the document but leave generated files on disk
        #[arg(long)]
        keep_files: bool,
        /// Only these albums (repeatable)
        #[arg(long = "album", value_name = "NAME")]
        albums: Vec<String>,
    },
    /// Interactively set the manual order of one album
    Reorder {
        album: String,
    },
    /// Print masonry placements for an album as JSON
    #[command(group(ArgGroup::new("target").required(true).args(["album", "all"])))]
    Layout {
        album: Option<String>,
        /// Lay out every public album together
        #[arg(long)]
        all: bool,
        /// Container width in pixels
        #[arg(long, allow_negative_numbers = true)]
        width: f64,
        /// Viewport width in pixels [default: the container width]
        #[arg(long)]
        viewport: Option<f64>,
    },
    /// Print a stock folio.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Import { album, no_ai } => {
            let (site_config, paths) = load_site(&cli.root, cli.config.as_deref())?;
            let mut doc = document::load(&paths.document)?;
            let analyzer = analysis::analyzer_for(&site_config.analysis, no_ai);
            let backend = RustBackend::new();
            let options = ImportOptions::new(album);

            let interrupt = options.interrupt.clone();
            ctrlc::set_handler(move || interrupt.store(true, Ordering::SeqCst))?;

            let importer = Importer {
                paths: &paths,
                config: &site_config,
                backend: &backend,
                analyzer: &*analyzer,
            };
            let (tx, rx) = mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_import_event(&event);
                }
            });
            let result = importer.run(&mut doc, &options, Some(tx));
            printer.join().map_err(|_| "output thread panicked")?;
            let report = result?;

            document::save(&doc, &paths.document)?;
            output::print_import_summary(&report);
        }
        Command::Sync { dry_run, renames } => {
            let (site_config, paths) = load_site(&cli.root, cli.config.as_deref())?;
            if !paths.albums.is_dir() {
                return Err(format!("albums directory not found: {}", paths.albums.display()).into());
            }
            let mut doc = document::load(&paths.document)?;
            let directories = import::discover_albums(&paths.albums)?;
            let plan = sync::plan_sync(
                &doc,
                &directories,
                &renames,
                site_config.sync.similarity_threshold,
            )?;
            output::print_sync_plan(&plan);

            if dry_run.dry_run || plan.renames.is_empty() {
                return Ok(());
            }
            let report = sync::apply_sync(&mut doc, &plan, &paths);
            document::save(&doc, &paths.document)?;
            output::print_sync_applied(&report, &paths.root);
            if !report.failed.is_empty() {
                return Err(format!(
                    "{} of {} renames failed",
                    report.failed.len(),
                    plan.renames.len()
                )
                .into());
            }
        }
        Command::Cleanup {
            dry_run,
            yes,
            keep_files,
            albums,
        } => {
            let (_, paths) = load_site(&cli.root, cli.config.as_deref())?;
            let mut doc = document::load(&paths.document)?;
            let options = CleanupOptions { albums, keep_files };
            let plan = cleanup::plan_cleanup(&doc, &paths, &options)?;
            output::print_cleanup_plan(&plan, &paths.root);

            if plan.is_empty() || dry_run.dry_run {
                return Ok(());
            }
            if !yes && !confirm("Apply these removals?")? {
                println!("Cancelled, nothing changed");
                return Ok(());
            }
            let report = cleanup::apply_cleanup(&mut doc, &plan, &paths, &options);
            document::save(&doc, &paths.document)?;
            output::print_cleanup_report(&report);
        }
        Command::Reorder { album } => {
            let (_, paths) = load_site(&cli.root, cli.config.as_deref())?;
            let mut doc = document::load(&paths.document)?;
            let mut session = ReorderSession::new(&doc, &album)?;
            let end = {
                let mut input = io::stdin().lock();
                let mut out = io::stdout().lock();
                reorder::run_interactive(&mut session, &mut input, &mut out)?
            };
            if end == SessionEnd::Save {
                session.commit(&mut doc)?;
                document::save(&doc, &paths.document)?;
                println!("Saved order for {}", album);
            }
        }
        Command::Layout {
            album,
            all,
            width,
            viewport,
        } => {
            let (site_config, paths) = load_site(&cli.root, cli.config.as_deref())?;
            let doc = document::load(&paths.document)?;
            let photos: Vec<(&str, &Photo)> = if all {
                doc.iter()
                    .filter(|(_, a)| !a.is_private())
                    .flat_map(|(key, a)| display_order(key, a))
                    .collect()
            } else {
                let key = album.as_deref().unwrap_or_default();
                let found = doc
                    .get(key)
                    .ok_or_else(|| format!("album '{}' is not in the document", key))?;
                display_order(key, found)
            };

            let viewport = viewport.unwrap_or(width);
            let config = LayoutConfig::from(&site_config.layout);
            let placed =
                layout::layout_photos(photos.iter().map(|(_, p)| *p), width, viewport, &config);
            println!(
                "{}",
                output::format_layout_json(&photos, &placed, width, viewport)?
            );
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load `folio.toml` (stock defaults when absent) and resolve site paths.
/// An explicitly given config file must exist.
fn load_site(
    root: &Path,
    explicit: Option<&Path>,
) -> Result<(SiteConfig, SitePaths), Box<dyn std::error::Error>> {
    let config_path = match explicit {
        Some(path) if !path.is_file() => {
            return Err(format!("config file not found: {}", path.display()).into());
        }
        Some(path) => path.to_path_buf(),
        None => root.join(config::CONFIG_FILENAME),
    };
    let site_config = config::load_config(&config_path)?;
    let paths = SitePaths::new(root, &site_config);
    Ok((site_config, paths))
}

/// An album's photos in the order the front-end shows them.
fn display_order<'a>(key: &'a str, album: &'a Album) -> Vec<(&'a str, &'a Photo)> {
    let mut images: Vec<&Photo> = album.images.iter().collect();
    images.sort_by(|a, b| document::compare_photos(a, b));
    images.into_iter().map(|p| (key, p)).collect()
}

/// Diagnostics go to stderr through `tracing`; `RUST_LOG` overrides the
/// default `warn` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

/// Ask a yes/no question on stdin. Anything but `y`/`yes` is a no.
fn confirm(question: &str) -> io::Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
