mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use tokio_util::sync::CancellationToken;

use hf_av::{
    CompressJob, Encoder, FfmpegEncoder, FfprobeProber, Prober, SplitJob, ToolRegistry,
    VideoStreamInfo,
};
use hf_core::config::Config;
use hf_core::Resolution;
use hf_pipeline::{IngestPipeline, LiveCapture, PipelineSettings, RawFrameSource};
use hf_server::AppContext;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "hlsforge=debug,hf_pipeline=debug,hf_media=debug,hf_av=debug,hf_server=debug,tower_http=debug".to_string()
        } else {
            "hlsforge=info,hf_pipeline=info,hf_media=info,hf_av=info,hf_server=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Prepare { input } => block_on(prepare(&input, config_path)),
        Commands::Package { chunks } => block_on(package(chunks.as_deref(), config_path)),
        Commands::Live {
            input,
            serve,
            realtime,
        } => block_on(live(&input, serve, realtime, config_path)),
        Commands::Serve { host, port } => block_on(serve(host, port, config_path)),
        Commands::Probe { file, json } => block_on(probe_file(&file, json, config_path)),
        Commands::Clean => clean(config_path),
        Commands::CheckTools => check_tools(config_path),
        Commands::Validate {
            config: validate_path,
        } => {
            let path = validate_path.or_else(|| config_path.map(Path::to_path_buf));
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("hlsforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(fut: F) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(fut)
}

/// A token cancelled on Ctrl+C.
fn stop_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Stop requested");
            token.cancel();
        }
    });
    cancel
}

fn load_config(path: Option<&Path>) -> Config {
    let config = Config::load_or_default(path);
    for warning in config.validate() {
        tracing::warn!("Config: {warning}");
    }
    config
}

fn prober(tools: &ToolRegistry) -> Option<FfprobeProber> {
    match tools.require("ffprobe") {
        Ok(tool) => Some(FfprobeProber::new(tool.path.clone())),
        Err(e) => {
            tracing::warn!("{e}; bitrates will be treated as unknown");
            None
        }
    }
}

async fn probe_bitrate(tools: &ToolRegistry, path: &Path) -> Option<u32> {
    let prober = prober(tools)?;
    hf_av::probe_bitrate_kbps(&prober, path).await
}

fn top_resolution(config: &Config) -> Result<Resolution> {
    config
        .ladder
        .resolutions
        .iter()
        .copied()
        .max_by_key(Resolution::pixels)
        .context("ladder.resolutions is empty")
}

fn build_pipeline(config: &Config, tools: &ToolRegistry) -> Result<IngestPipeline> {
    let encoder = FfmpegEncoder::from_registry(tools, config.encoder.clone())?;
    Ok(IngestPipeline::new(
        Arc::new(encoder),
        PipelineSettings::from_config(config),
    ))
}

async fn prepare(input: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    let tools = ToolRegistry::discover(&config.tools);
    let encoder = FfmpegEncoder::from_registry(&tools, config.encoder.clone())?;
    let prepare = &config.prepare;

    match probe_bitrate(&tools, input).await {
        Some(kbps) => tracing::info!("Source bitrate: {kbps} kbps"),
        None => tracing::info!("Source bitrate: unknown"),
    }

    let resolution = top_resolution(&config)?;
    tracing::info!(
        "Normalising {} to {} at {resolution}",
        input.display(),
        prepare.normalized_path.display()
    );
    encoder
        .compress_source(&CompressJob {
            input: input.to_path_buf(),
            output: prepare.normalized_path.clone(),
            resolution,
            bitrate: prepare.bitrate.clone(),
            bufsize: prepare.bufsize.clone(),
            preset: prepare.preset.clone(),
            tune: prepare.tune.clone(),
        })
        .await?;

    let normalized_kbps = probe_bitrate(&tools, &prepare.normalized_path).await;
    encoder
        .split_source(&SplitJob {
            input: prepare.normalized_path.clone(),
            chunk_dir: prepare.chunk_dir.clone(),
            chunk_seconds: prepare.chunk_seconds,
            bitrate_kbps: normalized_kbps,
        })
        .await?;

    let chunks = hf_av::list_chunks(&prepare.chunk_dir)?;
    println!(
        "Prepared {} chunk(s) of {}s in {}",
        chunks.len(),
        prepare.chunk_seconds,
        prepare.chunk_dir.display()
    );
    Ok(())
}

async fn package(chunks: Option<&Path>, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    let chunk_dir = chunks.unwrap_or(config.prepare.chunk_dir.as_path()).to_path_buf();
    let tools = ToolRegistry::discover(&config.tools);
    let pipeline = build_pipeline(&config, &tools)?;

    // Every chunk shares the normalised source's bitrate.
    let source_kbps = if config.prepare.normalized_path.exists() {
        probe_bitrate(&tools, &config.prepare.normalized_path).await
    } else {
        tracing::info!("No normalised source found; using floor bitrates");
        None
    };

    let cancel = stop_on_ctrl_c();
    let report = hf_pipeline::ingest_directory(&pipeline, &chunk_dir, source_kbps, &cancel).await?;

    let stats = pipeline.stats().snapshot();
    println!(
        "Ingested {} chunk(s): {} complete, {} partial, {} failed, {} cancelled, {} not started",
        report.chunks.len(),
        stats.chunks_complete,
        stats.chunks_partial,
        stats.chunks_failed,
        stats.chunks_cancelled,
        report.not_started
    );
    println!(
        "{} segment(s) written under {}",
        report.segments_produced(),
        config.output.root.display()
    );
    Ok(())
}

async fn live(input: &Path, serve: bool, realtime: bool, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    let pipeline = build_pipeline(&config, &tools)?;
    let ffmpeg = tools.require("ffmpeg")?.path.clone();
    let source_kbps = probe_bitrate(&tools, input).await;
    let resolution = top_resolution(&config)?;
    let cancel = stop_on_ctrl_c();

    let server = if serve {
        let ctx = AppContext::with_pipeline(config.clone(), &pipeline, tools.clone());
        Some(tokio::spawn(hf_server::serve(ctx, cancel.clone())))
    } else {
        None
    };

    let source = RawFrameSource::new(ffmpeg, input.to_path_buf(), resolution, config.live.fps)
        .realtime(realtime);
    let (frames, decoder) = source.spawn(config.live.channel_capacity, cancel.clone());
    let mut capture = LiveCapture::new(pipeline, config.live.clone(), source_kbps);

    let summary = hf_pipeline::run_live(frames, &mut capture, &cancel).await;
    match decoder.await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::error!("Frame source failed: {e}"),
        Err(e) => tracing::error!("Frame source task panicked: {e}"),
    }

    println!(
        "Live session: {} frame(s), {} chunk(s) ingested, {} dropped, {} frame(s) discarded",
        summary.frames_received,
        summary.chunks_ingested,
        summary.chunks_dropped,
        summary.frames_discarded
    );

    if let Some(server) = server {
        if !cancel.is_cancelled() {
            println!("Ingestion finished; still serving. Press Ctrl+C to stop.");
        }
        server.await??;
    }
    Ok(())
}

async fn serve(host: Option<String>, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_path);
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let tools = Arc::new(ToolRegistry::discover(&config.tools));
    let ctx = AppContext::standalone(config, tools);
    hf_server::serve(ctx, CancellationToken::new()).await?;
    Ok(())
}

async fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }
    let config = load_config(config_path);
    let tools = ToolRegistry::discover(&config.tools);
    let prober = FfprobeProber::new(tools.require("ffprobe")?.path.clone());

    let info = prober.video_stream(file).await.unwrap_or_else(|e| {
        tracing::warn!("Probe failed: {e}");
        VideoStreamInfo::default()
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    fn or_unknown<T: ToString>(value: Option<T>) -> String {
        value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
    }

    println!("File: {}", file.display());
    println!("Bitrate: {} kbps", or_unknown(info.bitrate_kbps));
    println!("Frames: {}", or_unknown(info.frame_count));
    match (info.width, info.height) {
        (Some(w), Some(h)) => println!("Resolution: {w}x{h}"),
        _ => println!("Resolution: unknown"),
    }
    println!(
        "Frame rate: {}",
        or_unknown(info.frame_rate.map(|fps| format!("{fps:.3}")))
    );
    Ok(())
}

fn clean(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    let root = &config.output.root;
    let removed = hf_media::clear_output(root)
        .with_context(|| format!("failed to clear {}", root.display()))?;
    if removed {
        println!("Removed {}", root.display());
    } else {
        println!("Nothing to remove at {}", root.display());
    }
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = load_config(config_path);
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg and ffprobe to package video.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Output root: {}", config.output.root.display());
    println!(
        "  Segments: {}s, {:?} playlists",
        config.output.segment_duration, config.output.playlist_kind
    );
    println!("  Ladder:");
    for variant in &config.ladder.declared {
        println!(
            "    {} {} @ {} bps",
            variant.name, variant.resolution, variant.bandwidth
        );
    }
    println!(
        "  Live: {} fps, {}s chunks",
        config.live.fps, config.live.chunk_seconds
    );

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("  Warnings:");
        for warning in warnings {
            println!("    - {warning}");
        }
    }

    Ok(())
}
