//! Decoder front-end: reconstructs a raw CD-ROM image from a `.ecm` file.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ecm::{decode, DecodeStats, EcmError, EcmResult};
use log::{info, warn};

/// Decode a `.ecm` file back into a raw CD-ROM image.
#[derive(Parser, Debug)]
#[command(name = "unecm", version, about)]
struct Args {
    /// Input `.ecm` file, or `-` to read from stdin. Must end in `.ecm`
    /// (case-insensitive) unless an explicit output path is given.
    input: PathBuf,

    /// Output image file; defaults to `<input>` with the `.ecm` suffix
    /// removed. Use `-` for stdout.
    output: Option<PathBuf>,

    /// Write a `.cue` sheet alongside the reconstructed image.
    #[arg(long)]
    cue: bool,

    /// Print progress after decoding (equivalent to `RUST_LOG=info`).
    #[arg(short, long)]
    verbose: bool,
}

fn strip_ecm_suffix(input: &PathBuf) -> EcmResult<PathBuf> {
    let name = input.to_string_lossy();
    if name.len() < 5 || !name[name.len() - 4..].eq_ignore_ascii_case(".ecm") {
        return Err(EcmError::Corrupt("input filename must end in .ecm"));
    }
    Ok(PathBuf::from(&name[..name.len() - 4]))
}

fn cue_contents(output_name: &str, stats: &DecodeStats) -> String {
    let track_type = if stats.mode1_only() { "MODE1/2352" } else { "MODE2/2352" };
    format!("FILE \"{output_name}\" BINARY\n  TRACK 01 {track_type}\n    INDEX 01 00:00:00\n")
}

fn run(args: &Args) -> EcmResult<DecodeStats> {
    let output_path = match &args.output {
        Some(p) => p.clone(),
        None => strip_ecm_suffix(&args.input)?,
    };

    info!("decoding {} to {}", args.input.display(), output_path.display());

    let stats = if args.input.as_os_str() == "-" {
        let stdin = io::stdin();
        let mut input = BufReader::new(stdin.lock());
        decode_to(&output_path, &mut input)?
    } else {
        let mut input = BufReader::new(File::open(&args.input)?);
        decode_to(&output_path, &mut input)?
    };

    if args.cue {
        if output_path.as_os_str() == "-" {
            warn!("--cue has no adjacent file to write next to when output is stdout, skipping");
        } else {
            let output_name =
                output_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let cue_path = output_path.with_extension("cue");
            std::fs::write(&cue_path, cue_contents(&output_name, &stats))?;
            info!("wrote {}", cue_path.display());
        }
    }

    Ok(stats)
}

fn decode_to<R: io::Read>(output_path: &PathBuf, input: &mut R) -> EcmResult<DecodeStats> {
    if output_path.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        let stats = decode(input, &mut out)?;
        out.flush()?;
        Ok(stats)
    } else {
        let mut out = BufWriter::new(File::create(output_path)?);
        let stats = decode(input, &mut out)?;
        out.flush()?;
        Ok(stats)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match run(&args) {
        Ok(stats) => {
            info!("done: {} bytes written", stats.output_bytes);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("unecm: {e}");
            ExitCode::FAILURE
        }
    }
}
