use std::io::Read;
use std::path::Path;

use anyhow::{Context, bail};
use clap::Parser;
use dom_stream::{
    ApplyingSink, DestinationTree, DomParserStream, ReplayConfig, ReplaySink, StreamStats,
};
use include::{LoadState, StreamingInclude};
use net::FetchOptions;
use runtime_parse::StreamConfig;
use url::Url;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Stream a document into a tree as it arrives and print the result.
#[derive(Parser, Debug)]
#[command(name = "streaming-include", version)]
struct Cli {
    /// File path or URL of the markup.
    src: String,

    /// Bytes requested per read from the source.
    #[arg(long, default_value_t = 8192)]
    chunk_size: usize,

    /// Text chunks parsed per change delivery.
    #[arg(long, default_value_t = 1)]
    deliver_every: usize,

    /// Merge adjacent text nodes while replaying.
    #[arg(long)]
    coalesce_text: bool,

    /// Read the whole body first and parse it in one go.
    #[arg(long)]
    fetch: bool,

    /// Log filter, e.g. `debug` or `runtime_parse=trace`.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(cli.log_level.as_str())
        .with_writer(std::io::stderr)
        .init();

    let url = resolve_src(&cli.src)?;
    log::info!(target: "streaming_include", "loading {url}");
    let replay_config = ReplayConfig {
        coalesce_text: cli.coalesce_text,
    };

    if cli.fetch {
        let (tree, stats) = fetch_then_parse(&url, replay_config)?;
        println!("{}", tree.inner_html());
        eprintln!(
            "fetch: {} bytes, {} instructions, {} clones, {} scripts executed",
            stats.bytes,
            stats.reconciler.instructions,
            stats.clones,
            tree.executed_scripts().len()
        );
        return Ok(());
    }

    let config = StreamConfig {
        deliver_every: cli.deliver_every.max(1),
        read_chunk_size: cli.chunk_size.max(1),
        ..StreamConfig::default()
    };
    let mut include = StreamingInclude::new(DestinationTree::new())
        .with_stream_config(config)
        .with_replay_config(replay_config);
    include.set_src(url.as_str());
    include.connect();
    let summary = match include.parsed() {
        LoadState::Loaded(summary) => summary.clone(),
        LoadState::Failed(err) => bail!("load of {url} failed: {err}"),
        state => bail!("load of {url} did not run: {state:?}"),
    };

    let tree = include.destination();
    println!("{}", tree.inner_html());
    let clones = summary.stats.as_ref().map_or(0, |stats| stats.clones);
    eprintln!(
        "stream: {} bytes, {} instructions, {} clones, {} merged text, {} scripts executed",
        summary.bytes,
        summary.applied,
        clones,
        include.replay().merged_text(),
        tree.executed_scripts().len()
    );
    for resource in include.resources() {
        eprintln!("  {:?} {}", resource.kind, resource.url);
    }
    Ok(())
}

/// Absolute URLs pass through; anything else is a local path.
fn resolve_src(src: &str) -> anyhow::Result<Url> {
    if let Ok(url) = Url::parse(src)
        && url.scheme().len() > 1
    {
        return Ok(url);
    }
    let path = Path::new(src)
        .canonicalize()
        .with_context(|| format!("cannot resolve {src}"))?;
    Url::from_file_path(&path).map_err(|_| anyhow::anyhow!("not a file path: {}", path.display()))
}

fn fetch_then_parse(
    url: &Url,
    config: ReplayConfig,
) -> anyhow::Result<(DestinationTree, StreamStats)> {
    let mut source = net::open_source(url.as_str(), &FetchOptions::default())
        .with_context(|| format!("cannot open {url}"))?;
    let mut bytes = Vec::new();
    source
        .body
        .read_to_end(&mut bytes)
        .with_context(|| format!("cannot read {url}"))?;
    let markup = String::from_utf8_lossy(&bytes);

    let mut replay = ReplaySink::with_config(DestinationTree::new(), config);
    let mut stream = DomParserStream::new();
    let mut sink = ApplyingSink::new(&mut replay);
    stream.write(&markup, &mut sink);
    stream.finish(&mut sink);
    sink.finish()?;
    Ok((replay.into_destination(), stream.stats()))
}
