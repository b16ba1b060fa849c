use anyhow::Context;
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracktrail::app::{self, AppOptions};
use tracktrail::config;

fn main() -> anyhow::Result<()> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    init_logging()?;
    log::info!("tracktrail starting up");
    app::run(options)
}

/// Logs go to a file; the terminal belongs to the UI. `RUST_LOG` overrides
/// the default `warn` filter.
fn init_logging() -> anyhow::Result<()> {
    let path = config::log_path()?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn parse_args(args: Vec<String>) -> anyhow::Result<AppOptions> {
    let mut out = AppOptions::default();
    let mut only_paths = false;
    for arg in args {
        match arg.as_str() {
            _ if only_paths => out.inputs.push(PathBuf::from(&arg)),
            "--" => only_paths = true,
            "--null-audio" => out.null_audio = true,
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other if other.starts_with('-') => anyhow::bail!("unknown argument {other}"),
            _ => out.inputs.push(PathBuf::from(&arg)),
        }
    }
    if out.inputs.is_empty() {
        anyhow::bail!("no audio files or folders given (see --help)");
    }
    Ok(out)
}

fn print_help() {
    println!("tracktrail <file-or-folder>...");
    println!("  --null-audio      Simulate playback without an audio device");
    println!("  -h, --help        Show this help");
    println!();
    println!("Settings: $TRACKTRAIL_CONFIG_DIR or ~/.config/tracktrail/settings.json");
}
