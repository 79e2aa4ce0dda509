use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use image::{ImageFormat, RgbaImage};
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use scroll_text::config::{RequestDefaults, Settings};
use scroll_text::generator::PreparedRender;
use scroll_text::library::VideoRecord;
use scroll_text::params::{Canvas, GenerationRequest, Rgb8};
use scroll_text::service::ScrollTextService;

#[derive(Debug, Parser)]
#[command(name = "scroll-text")]
#[command(version = env!("SCROLL_TEXT_VERSION"))]
#[command(about = "Render text scrolling across a solid canvas into an MP4")]
struct Cli {
    /// YAML settings file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Overrides the configured media root
    #[arg(long, global = true, value_name = "DIR")]
    media_root: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render a video and record it
    Generate {
        text: String,
        #[command(flatten)]
        render: RenderArgs,
        /// Write the video without adding a record
        #[arg(long)]
        no_record: bool,
        #[arg(long)]
        json: bool,
    },
    /// Render a single frame to PNG
    Frame {
        text: String,
        #[command(flatten)]
        render: RenderArgs,
        #[arg(long, default_value_t = 0)]
        index: u64,
        #[arg(short = 'o', long = "out")]
        out: PathBuf,
    },
    /// List recorded videos, newest first
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one recorded video
    Show {
        id: u64,
        #[arg(long)]
        json: bool,
    },
    /// Delete a recorded video and its file
    Remove { id: u64 },
    /// Serve the HTTP endpoint
    #[cfg(feature = "server")]
    Serve {
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
}

#[derive(Debug, Args)]
struct RenderArgs {
    /// Duration in whole seconds
    #[arg(long)]
    duration: Option<u32>,
    #[arg(long)]
    fps: Option<u32>,
    /// Canvas size, e.g. 320x180
    #[arg(long, value_name = "WxH")]
    size: Option<Canvas>,
    #[arg(long, value_name = "HEX")]
    text_color: Option<Rgb8>,
    #[arg(long, value_name = "HEX")]
    background: Option<Rgb8>,
}

impl RenderArgs {
    fn request(&self, defaults: &RequestDefaults, text: String) -> GenerationRequest {
        let mut request = defaults.request_for(text);
        if let Some(duration) = self.duration {
            request.duration_seconds = duration;
        }
        if let Some(fps) = self.fps {
            request.fps = fps;
        }
        if let Some(size) = self.size {
            request.canvas = size;
        }
        if let Some(color) = self.text_color {
            request.text_color = color;
        }
        if let Some(color) = self.background {
            request.background_color = color;
        }
        request
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(root) = &cli.media_root {
        settings.media_root = root.clone();
    }

    match cli.command {
        Commands::Generate {
            text,
            render,
            no_record,
            json,
        } => run_generate(&settings, render.request(&settings.defaults, text), no_record, json),
        Commands::Frame {
            text,
            render,
            index,
            out,
        } => run_frame(&render.request(&settings.defaults, text), index, &out),
        Commands::List { json } => run_list(&settings, json),
        Commands::Show { id, json } => run_show(&settings, id, json),
        Commands::Remove { id } => run_remove(&settings, id),
        #[cfg(feature = "server")]
        Commands::Serve { bind } => run_serve(settings, bind),
    }
}

fn init_logging(verbose: bool) {
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn run_generate(
    settings: &Settings,
    request: GenerationRequest,
    no_record: bool,
    json: bool,
) -> Result<()> {
    let service = ScrollTextService::new(settings);

    if no_record {
        let path = service
            .generator()
            .generate(&request, &service.library().videos_dir())
            .context("failed to generate video")?;
        if json {
            println!("{}", json!({ "ok": true, "path": path }));
        } else {
            println!("Wrote {}", path.display());
        }
        return Ok(());
    }

    let created = service
        .create_with(&request)
        .context("failed to generate video")?;
    if json {
        println!(
            "{}",
            json!({ "ok": true, "path": created.path, "record": created.record })
        );
    } else {
        println!(
            "Wrote {} (record {}, {} frames)",
            created.path.display(),
            created.record.id,
            created.record.frames
        );
    }
    Ok(())
}

fn run_frame(request: &GenerationRequest, index: u64, out: &Path) -> Result<()> {
    request.validate()?;
    let prepared = PreparedRender::new(request, Default::default())?;
    let frame = prepared.frame_at(index).ok_or_else(|| {
        anyhow!(
            "frame index {index} is out of range (video has {} frames)",
            prepared.params.frame_count
        )
    })?;

    let image = RgbaImage::from_raw(frame.width, frame.height, frame.data)
        .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))?;
    if let Some(parent) = out.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save_with_format(out, ImageFormat::Png)
        .with_context(|| format!("failed to write {}", out.display()))?;
    info!(index, text_x = frame.text_x, "frame written");
    println!("Wrote {}", out.display());
    Ok(())
}

fn run_list(settings: &Settings, json: bool) -> Result<()> {
    let service = ScrollTextService::new(settings);
    let records = service.library().list()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No videos recorded in {}", settings.media_root.display());
        return Ok(());
    }
    for record in &records {
        print_record_line(record);
    }
    Ok(())
}

fn run_show(settings: &Settings, id: u64, json: bool) -> Result<()> {
    let service = ScrollTextService::new(settings);
    let Some(record) = service.library().get(id)? else {
        bail!("no video with id {id}");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record_line(&record);
        println!("  path:    {}", service.library().resolve(&record).display());
        println!("  size:    {}x{} @ {} fps", record.width, record.height, record.fps);
        println!("  frames:  {}", record.frames);
        println!("  sha256:  {}", record.sha256);
    }
    Ok(())
}

fn run_remove(settings: &Settings, id: u64) -> Result<()> {
    let service = ScrollTextService::new(settings);
    match service.library().remove(id)? {
        Some(record) => {
            println!("Removed {} ({})", record.id, record.video_file);
            Ok(())
        }
        None => bail!("no video with id {id}"),
    }
}

#[cfg(feature = "server")]
fn run_serve(settings: Settings, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| settings.server.bind.clone());
    let service = std::sync::Arc::new(ScrollTextService::new(&settings));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(scroll_text::server::serve(service, &bind))
}

fn print_record_line(record: &VideoRecord) {
    println!(
        "{:>4}  {}  {}  {}",
        record.id,
        record.created_at.format("%Y-%m-%d %H:%M:%S"),
        record.video_file,
        record.label()
    );
}
