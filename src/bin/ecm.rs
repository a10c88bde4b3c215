//! Encoder front-end: turns a raw CD-ROM image into a `.ecm` file.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ecm::{encode_batch, encode_streaming, EcmResult, EncodeStats};
use log::{debug, info};

/// Encode a raw CD-ROM image into the ECM compressed format.
#[derive(Parser, Debug)]
#[command(name = "ecm", version, about)]
struct Args {
    /// Input CD-ROM image, or `-` to read from stdin.
    input: PathBuf,

    /// Output `.ecm` file; defaults to `<input>.ecm`. Use `-` for stdout.
    output: Option<PathBuf>,

    /// Print the per-type tally after encoding (equivalent to `RUST_LOG=info`).
    #[arg(short, long)]
    verbose: bool,
}

fn default_output(input: &PathBuf) -> PathBuf {
    let mut name = input.clone().into_os_string();
    name.push(".ecm");
    PathBuf::from(name)
}

fn write_output<F>(path: &PathBuf, f: F) -> EcmResult<EncodeStats>
where
    F: FnOnce(&mut dyn Write) -> EcmResult<EncodeStats>,
{
    if path.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        let stats = f(&mut out)?;
        out.flush()?;
        Ok(stats)
    } else {
        let mut out = BufWriter::new(File::create(path)?);
        let stats = f(&mut out)?;
        out.flush()?;
        Ok(stats)
    }
}

fn run(args: &Args) -> EcmResult<EncodeStats> {
    let output_path = args.output.clone().unwrap_or_else(|| default_output(&args.input));

    if args.input.as_os_str() == "-" {
        info!("encoding stdin to {}", output_path.display());
        let stdin = io::stdin();
        let mut input = BufReader::new(stdin.lock());
        return write_output(&output_path, |out| encode_streaming(&mut input, out));
    }

    info!("encoding {} to {}", args.input.display(), output_path.display());
    let mut file = File::open(&args.input)?;

    let seekable = file.seek(SeekFrom::End(0)).is_ok() && file.seek(SeekFrom::Start(0)).is_ok();
    debug!("input seekable: {seekable}");

    let mut input = BufReader::new(file);
    write_output(&output_path, |out| {
        if seekable {
            encode_batch(&mut input, out)
        } else {
            encode_streaming(&mut input, out)
        }
    })
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match run(&args) {
        Ok(stats) => {
            info!(
                "done: {} literal, {} mode1, {} mode2/form1, {} mode2/form2, {} trailing bytes",
                stats.literal, stats.mode1, stats.mode2_form1, stats.mode2_form2, stats.trailing_bytes
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ecm: {e}");
            ExitCode::FAILURE
        }
    }
}
