//! pipemon - copy stdin to stdout with a live progress indicator on stderr.
//!
//! With a regular file on stdin the total size is known and a bar is drawn;
//! otherwise a spinner shows bytes, elapsed time and average speed.

mod logging;

use clap::Parser;
use engine::{
    size_hint, stderr_probe, DiagnosticsConfig, EngineError, MonitoredTransfer, ProbeConfig,
    Progress, TerminalProbe, TerminalRenderer, TransferObserver, TransferStats,
};
use std::io::{self, Read, Write};
use std::path::PathBuf;

/// pipemon - watch a byte stream go by
#[derive(Parser, Debug)]
#[command(name = "pipemon")]
#[command(version = "0.1.0")]
#[command(about = "Copy stdin to stdout while showing progress on stderr")]
struct Args {
    /// Append diagnostics to PATH (debug.txt when given without a value)
    #[arg(short = 'd', long = "debug-log", value_name = "PATH", num_args = 0..=1)]
    debug_log: Option<Option<PathBuf>>,

    /// Total size in bytes, overriding what stdin reports
    #[arg(short = 's', long, value_name = "BYTES")]
    size: Option<u64>,

    /// Copy without drawing progress
    #[arg(long)]
    no_progress: bool,
}

impl Args {
    fn diagnostics(&self) -> DiagnosticsConfig {
        match &self.debug_log {
            None => DiagnosticsConfig::disabled(),
            Some(path) => DiagnosticsConfig::enabled(path.clone()),
        }
    }
}

fn main() {
    let args = Args::parse();

    let exit_code = match run_cli(&args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Wire the standard streams into a transfer - separated for testability
fn run_cli(args: &Args) -> Result<(), EngineError> {
    logging::init(&args.diagnostics())?;

    let total_size = match args.size {
        Some(size) => size,
        None => stat_stdin()?,
    };

    let output = io::BufWriter::new(io::stdout());
    let probe = stderr_probe(ProbeConfig::default());
    run_pipe(
        io::stdin(),
        output,
        total_size,
        !args.no_progress,
        probe,
        io::stderr(),
    )?;
    Ok(())
}

/// Size hint for stdin: its length when redirected from a regular file.
#[cfg(unix)]
fn stat_stdin() -> Result<u64, EngineError> {
    use std::os::fd::AsFd;

    let fd = io::stdin()
        .as_fd()
        .try_clone_to_owned()
        .map_err(|source| EngineError::StatInput { source })?;
    let metadata = std::fs::File::from(fd)
        .metadata()
        .map_err(|source| EngineError::StatInput { source })?;
    Ok(size_hint(&metadata))
}

#[cfg(not(unix))]
fn stat_stdin() -> Result<u64, EngineError> {
    Ok(0)
}

/// Copy `input` to `output`, drawing progress frames to `term`.
fn run_pipe<R, W, E>(
    input: R,
    output: W,
    total_size: u64,
    show_progress: bool,
    probe: Box<dyn TerminalProbe>,
    mut term: E,
) -> Result<TransferStats, EngineError>
where
    R: Read + Send,
    W: Write + Send,
    E: Write,
{
    if !show_progress {
        return MonitoredTransfer::new(input, output, total_size).start();
    }

    let progress = Progress::new(total_size, probe, &mut term)?;
    let mut renderer = TerminalRenderer::new(progress, term);

    let result = {
        let mut transfer = MonitoredTransfer::new(input, output, total_size);
        transfer.add_observer(|stats: TransferStats| renderer.on_stats(stats));
        transfer.start()
    };

    renderer.finish();
    result
}
