#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use cwin::{CacheWindow, DescriptorStats, WindowConfig, WindowStats};
use serde::Serialize;
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CopyMode {
    #[default]
    Byte,
    Block,
}

#[derive(Debug, Default)]
struct Options {
    positionals: Vec<String>,
    mode: CopyMode,
    chunk: Option<usize>,
    window: Option<usize>,
    no_sync: bool,
    config: Option<PathBuf>,
    json: bool,
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct HandleReport {
    path: String,
    calls: WindowStats,
    descriptor: DescriptorStats,
}

#[derive(Debug, Serialize)]
struct CopyReport {
    mode: CopyMode,
    bytes: u64,
    window_size: usize,
    source: HandleReport,
    destination: HandleReport,
}

#[derive(Debug, Serialize)]
struct StatOutput {
    path: String,
    file_size: u64,
    window_size: usize,
    primed_bytes: usize,
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        return Ok(());
    };
    let opts = parse_options(args)?;
    init_tracing(opts.verbose);

    match command.as_str() {
        "copy" => {
            let [src, dst] = opts.positionals.as_slice() else {
                bail!("copy requires <src> <dst>");
            };
            let cfg = window_config(&opts)?;
            let report = copy_file(Path::new(src), Path::new(dst), &cfg, opts.mode, opts.chunk)?;
            if opts.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("serialize report")?
                );
            } else {
                println!("copied {} bytes ({:?} mode)", report.bytes, report.mode);
                print_handle("source", &report.source);
                print_handle("destination", &report.destination);
            }
            Ok(())
        }
        "cat" => {
            let [path] = opts.positionals.as_slice() else {
                bail!("cat requires <path>");
            };
            let cfg = window_config(&opts)?;
            let mut out = std::io::stdout().lock();
            cat_file(Path::new(path), &cfg, &mut out)?;
            out.flush().context("flush stdout")?;
            Ok(())
        }
        "stat" => {
            let [path] = opts.positionals.as_slice() else {
                bail!("stat requires <path>");
            };
            let cfg = window_config(&opts)?;
            let output = stat_file(Path::new(path), &cfg)?;
            if opts.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output).context("serialize output")?
                );
            } else {
                println!("path: {}", output.path);
                println!("file_size: {}", output.file_size);
                println!("window_size: {}", output.window_size);
                println!("primed_bytes: {}", output.primed_bytes);
            }
            Ok(())
        }
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        _ => {
            print_usage();
            bail!("unknown command: {command}")
        }
    }
}

fn print_usage() {
    println!("cwin\n");
    println!("USAGE:");
    println!("  cwin copy <src> <dst> [--mode byte|block] [--chunk <n>] [OPTIONS]");
    println!("  cwin cat <path> [OPTIONS]");
    println!("  cwin stat <path> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  --window <n>       window size in bytes (default 8)");
    println!("  --no-sync          open without O_SYNC");
    println!("  --config <file>    JSON window configuration");
    println!("  --json             machine-readable output");
    println!("  -v, --verbose      debug logging (otherwise RUST_LOG, default warn)");
}

fn print_handle(role: &str, handle: &HandleReport) {
    println!(
        "{role}: {} (read_calls={} write_calls={} seeks={}; syscalls: reads={} writes={} seeks={})",
        handle.path,
        handle.calls.read_calls,
        handle.calls.write_calls,
        handle.calls.seeks,
        handle.descriptor.reads,
        handle.descriptor.writes,
        handle.descriptor.seeks,
    );
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_options(args: impl IntoIterator<Item = String>) -> Result<Options> {
    let mut opts = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--mode" => {
                let value = args.next().context("--mode requires byte|block")?;
                opts.mode = match value.as_str() {
                    "byte" => CopyMode::Byte,
                    "block" => CopyMode::Block,
                    other => bail!("unknown copy mode: {other}"),
                };
            }
            "--chunk" => {
                let value = args.next().context("--chunk requires a byte count")?;
                opts.chunk = Some(parse_count("--chunk", &value)?);
            }
            "--window" => {
                let value = args.next().context("--window requires a byte count")?;
                opts.window = Some(parse_count("--window", &value)?);
            }
            "--config" => {
                let value = args.next().context("--config requires a path")?;
                opts.config = Some(PathBuf::from(value));
            }
            "--no-sync" => opts.no_sync = true,
            "--json" => opts.json = true,
            "-v" | "--verbose" => opts.verbose = true,
            flag if flag.starts_with("--") => bail!("unknown option: {flag}"),
            _ => opts.positionals.push(arg),
        }
    }
    Ok(opts)
}

fn parse_count(flag: &str, value: &str) -> Result<usize> {
    let n: usize = value
        .parse()
        .with_context(|| format!("{flag} expects a positive integer, got {value:?}"))?;
    if n == 0 {
        bail!("{flag} must be greater than zero");
    }
    Ok(n)
}

/// Defaults, then the config file, then explicit flags.
fn window_config(opts: &Options) -> Result<WindowConfig> {
    let mut cfg = match &opts.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("invalid window config in {}", path.display()))?
        }
        None => WindowConfig::default(),
    };
    if let Some(window) = opts.window {
        cfg.window_size = window;
    }
    if opts.no_sync {
        cfg.sync_writes = false;
    }
    cfg.validate().context("window configuration rejected")?;
    Ok(cfg)
}

fn open_existing(path: &Path, cfg: &WindowConfig) -> Result<CacheWindow> {
    let cfg = WindowConfig {
        create: false,
        ..cfg.clone()
    };
    CacheWindow::open_with(path, path.display().to_string(), &cfg)
        .with_context(|| format!("failed to open {}", path.display()))
}

fn copy_file(
    src: &Path,
    dst: &Path,
    cfg: &WindowConfig,
    mode: CopyMode,
    chunk: Option<usize>,
) -> Result<CopyReport> {
    let mut reader = open_existing(src, cfg)?;
    if dst.exists() {
        fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(dst)
            .with_context(|| format!("failed to truncate {}", dst.display()))?;
    }
    let mut writer = CacheWindow::open_with(dst, dst.display().to_string(), cfg)
        .with_context(|| format!("failed to open {}", dst.display()))?;

    let mut bytes = 0_u64;
    match mode {
        CopyMode::Byte => {
            while let Some(byte) = reader.read_byte()? {
                writer.write_byte(byte)?;
                bytes += 1;
            }
        }
        CopyMode::Block => {
            let mut buf = vec![0_u8; chunk.unwrap_or(cfg.window_size)];
            loop {
                let n = reader.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                let mut done = 0;
                while done < n {
                    let written = writer.write(&buf[done..n])?;
                    if written == 0 {
                        bail!("{} accepted no bytes at offset {}", dst.display(), bytes);
                    }
                    done += written;
                }
                bytes += n as u64;
            }
        }
    }
    debug!(bytes, ?mode, "copy finished");

    // Write back before snapshotting so the reported descriptor calls
    // include the final flush.
    reader.flush()?;
    writer.flush()?;

    let source = HandleReport {
        path: src.display().to_string(),
        descriptor: reader.descriptor_stats(),
        calls: reader.close()?,
    };
    let destination = HandleReport {
        path: dst.display().to_string(),
        descriptor: writer.descriptor_stats(),
        calls: writer.close()?,
    };
    Ok(CopyReport {
        mode,
        bytes,
        window_size: cfg.window_size,
        source,
        destination,
    })
}

fn cat_file(path: &Path, cfg: &WindowConfig, out: &mut impl Write) -> Result<u64> {
    let mut reader = open_existing(path, cfg)?;
    let mut count = 0_u64;
    while let Some(byte) = reader.read_byte()? {
        out.write_all(&[byte]).context("write output")?;
        count += 1;
    }
    reader.close()?;
    Ok(count)
}

fn stat_file(path: &Path, cfg: &WindowConfig) -> Result<StatOutput> {
    let reader = open_existing(path, cfg)?;
    let output = StatOutput {
        path: path.display().to_string(),
        file_size: reader.file_size()?,
        window_size: reader.window_size(),
        primed_bytes: reader.valid_bytes(),
    };
    reader.close()?;
    Ok(output)
}
