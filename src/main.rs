//! Tab Counter - Entry Point
//!
//! Runs the native messaging host by default. The other subcommands render
//! icons to PNG files, print the native messaging manifest and replay
//! recorded events against the in-memory browser model.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tab_counter::{
    core::{config::Config, settings::Settings},
    icon::{compute_geometry, pan::ease, render_frame, render_static, FontBackend, FontBook,
        StylePreset, LARGE_ICON, SMALL_ICON},
    Engine, HostEvent, MemoryHost, NativeHost, SettingsStore,
};
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "tab-counter", version, about = "Tab Counter native messaging host")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Chrome passes this on Windows
    #[arg(long, hide = true)]
    parent_window: Option<String>,

    /// Arguments the browser appends when it launches the host
    #[arg(hide = true)]
    origin: Vec<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the native messaging host on stdin/stdout (default)
    Host {
        /// Arguments the browser appends when it launches the host
        origin: Vec<String>,
    },
    /// Render TEXT to PNG files
    Render {
        text: String,
        /// Icon style: xl, readable or wide
        #[arg(long, default_value_t = StylePreset::Readable)]
        style: StylePreset,
        /// Icon size in pixels (both toolbar sizes when omitted)
        #[arg(long)]
        size: Option<u32>,
        /// Frames to write for text that pans
        #[arg(long, default_value_t = 8)]
        frames: u32,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Glyph source: system or builtin
        #[arg(long, default_value = "system")]
        font: FontBackend,
    },
    /// Print the native messaging manifest
    Manifest {
        #[arg(long, default_value = "tab_counter")]
        name: String,
        /// Absolute path of this binary
        #[arg(long)]
        path: Option<PathBuf>,
        /// Firefox extension id (repeatable)
        #[arg(long = "allowed-extension")]
        allowed_extensions: Vec<String>,
        /// Chrome extension origin (repeatable)
        #[arg(long = "allowed-origin")]
        allowed_origins: Vec<String>,
    },
    /// Print the default config file, or write it where the host reads it
    Config {
        /// Write to the config path instead of printing (never overwrites)
        #[arg(long)]
        write: bool,
    },
    /// Replay JSON-lines events against an in-memory browser
    Replay {
        file: PathBuf,
        /// Counter mode (0 to 4)
        #[arg(long, default_value_t = 0)]
        counter: u8,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // stdout carries the native messaging protocol
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    match cli.command {
        None => runtime.block_on(run_host(config, &cli.origin)),
        Some(Commands::Host { origin }) => runtime.block_on(run_host(config, &origin)),
        Some(Commands::Render {
            text,
            style,
            size,
            frames,
            out,
            font,
        }) => render(&text, style, size, frames, &out, font),
        Some(Commands::Manifest {
            name,
            path,
            allowed_extensions,
            allowed_origins,
        }) => manifest(&name, path, &allowed_extensions, &allowed_origins),
        Some(Commands::Config { write }) => write_config(cli.config.as_deref(), write),
        Some(Commands::Replay { file, counter }) => {
            runtime.block_on(replay(config, &file, counter))
        }
    }
}

async fn run_host(config: Config, origin: &[String]) -> Result<()> {
    info!("Starting Tab Counter host (origin: {:?})", origin);

    let store = SettingsStore::open_default()?;
    info!("Settings at {:?}", store.path());

    let (host, events) = NativeHost::spawn(tokio::io::stdin(), tokio::io::stdout());
    let mut engine = Engine::new(Arc::new(host), &config).with_store(store);

    let outcome = engine.initialize(Instant::now()).await;
    info!("Initial paint: {:?}", outcome);

    engine.run(events).await;
    Ok(())
}

fn render(
    text: &str,
    style: StylePreset,
    size: Option<u32>,
    frames: u32,
    out: &Path,
    backend: FontBackend,
) -> Result<()> {
    std::fs::create_dir_all(out)
        .with_context(|| format!("Failed to create output directory: {:?}", out))?;

    let options = style.options();
    let mut fonts = FontBook::new(backend);
    let font = fonts.resolve(options);
    let sizes = match size {
        Some(size) => vec![size],
        None => vec![SMALL_ICON, LARGE_ICON],
    };
    let stem: String = text
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    for size in sizes {
        let geometry = compute_geometry(size, text, options, font);
        if !geometry.needs_pan() {
            let image = render_static(text, size, options, font)?;
            let path = out.join(format!("{}-{}.png", stem, size));
            write_png(&path, &image.encode_png()?)?;
            continue;
        }

        let frames = frames.max(1);
        for i in 0..frames {
            let progress = ease(f64::from(i) / f64::from(frames)) as f32;
            let image = render_frame(text, &geometry, geometry.max_offset * progress, options, font)?;
            let path = out.join(format!("{}-{}-{:03}.png", stem, size, i));
            write_png(&path, &image.encode_png()?)?;
        }
    }
    Ok(())
}

fn write_png(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {:?}", path))?;
    println!("{}", path.display());
    Ok(())
}

fn manifest(
    name: &str,
    path: Option<PathBuf>,
    allowed_extensions: &[String],
    allowed_origins: &[String],
) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => std::env::current_exe().context("Failed to locate the host binary")?,
    };

    let mut manifest = serde_json::json!({
        "name": name,
        "description": "Tab Counter native host",
        "path": path,
        "type": "stdio",
    });
    if !allowed_extensions.is_empty() {
        manifest["allowed_extensions"] = serde_json::json!(allowed_extensions);
    }
    if !allowed_origins.is_empty() {
        manifest["allowed_origins"] = serde_json::json!(allowed_origins);
    }

    println!("{}", serde_json::to_string_pretty(&manifest)?);
    Ok(())
}

fn write_config(path: Option<&Path>, write: bool) -> Result<()> {
    if !write {
        print!("{}", Config::default_config_str());
        return Ok(());
    }

    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::config_path()?,
    };
    if Config::write_default(&path)? {
        info!("Wrote default config to {:?}", path);
    } else {
        info!("Config already exists at {:?}, leaving it alone", path);
    }
    println!("{}", path.display());
    Ok(())
}

async fn replay(config: Config, file: &Path, counter: u8) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read replay file: {:?}", file))?;

    let host = Arc::new(MemoryHost::new());
    let settings = Settings {
        counter,
        ..Settings::default()
    };
    let mut engine = Engine::new(Arc::clone(&host), &config).with_settings(settings);

    // virtual clock: every event lands after the previous paint settled
    let settle = config.paint.activation_window().max(config.paint.debounce()) + Duration::from_millis(1);
    let mut now = Instant::now();
    engine.initialize(now).await;

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event: HostEvent = serde_json::from_str(line)
            .with_context(|| format!("Invalid event on line {}", number + 1))?;
        let name = event.name();

        host.apply(&event);
        engine.handle_event(event, now).await;
        now += settle;
        let outcome = engine.step(now).await;

        let counts = engine.counts();
        println!(
            "{:>4} {:<20} window {:>3}/{:<3} all {:>4}/{:<4} windows {:>2}  {:?}",
            number + 1,
            name,
            counts.current_window,
            counts.current_window_total,
            counts.all_tabs,
            counts.all_tabs_total,
            counts.all_windows,
            outcome
        );
    }

    if let Err(problem) = engine.cache().check_invariants() {
        anyhow::bail!("Counter cache is inconsistent: {}", problem);
    }
    Ok(())
}
