// General flow:
//  - parse command line arguments:
//      - compress or decompress depending on the subcommand
//      - codec options come from an optional JSON file, overridden by explicit flags
//  - open the input (file or stdin) and the output (file or stdout)
//  - either stream the input through a codec stream, optionally flushing after every read, or
//    read it whole and run the one-shot buffer codec

use error_chain::bail;
use error_chain::ChainedError;
use brotli_stream::compression::options::{
    OptionsBuilder, DEFAULT_LGWIN, DEFAULT_QUALITY, MAX_LGWIN, MAX_QUALITY, MIN_LGWIN,
    MIN_QUALITY,
};
use brotli_stream::errors::*;
use brotli_stream::pipe::pipe;
use brotli_stream::{compress, compress_stream, decompress, decompress_stream, Options};

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

enum Command {
    Compress {
        options: Options,
        flush: bool,
    },
    Decompress,
}

struct Settings {
    command: Command,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    buffered: bool,
}

const APP_NAME: &str = "brotli-stream";
const ABOUT_STR: &str = "Compress or decompress brotli data, whole or as a flow-controlled stream";

const QUALITY_HELP: &str = const_format::formatcp!(
    "compression quality {}..={}, default {}",
    MIN_QUALITY,
    MAX_QUALITY,
    DEFAULT_QUALITY
);

const LGWIN_HELP: &str = const_format::formatcp!(
    "base 2 logarithm of the sliding window size {}..={}, default {}",
    MIN_LGWIN,
    MAX_LGWIN,
    DEFAULT_LGWIN
);

fn io_args<'a, 'b>() -> Vec<Arg<'a, 'b>> {
    vec![
        Arg::with_name("INPUT").help("file to read, stdin when omitted"),
        Arg::with_name("output")
            .short("o")
            .long("output")
            .takes_value(true)
            .help("file to write, stdout when omitted"),
        Arg::with_name("buffered")
            .long("buffered")
            .help("read the whole input and transform it in one shot"),
    ]
}

fn compress_options(m: &ArgMatches) -> Result<Options> {
    let mut builder = match m.value_of("options") {
        Some(path) => {
            let file = std::fs::File::open(path)
                .chain_err(|| format!("error opening options file \"{}\"", path))?;
            let value: serde_json::Value = serde_json::from_reader(std::io::BufReader::new(file))
                .map_err(|e| Error::from(ErrorKind::Config("options".to_string(), e.to_string())))
                .chain_err(|| format!("error reading options file \"{}\"", path))?;
            OptionsBuilder::from_json(&value)?
        }
        None => OptionsBuilder::new(),
    };

    if let Some(q) = m.value_of("quality") {
        builder = builder.quality(
            q.parse::<i64>()
                .chain_err(|| format!("error parsing quality \"{}\"", q))?,
        );
    }
    if let Some(w) = m.value_of("lgwin") {
        builder = builder.lgwin(
            w.parse::<i64>()
                .chain_err(|| format!("error parsing window size \"{}\"", w))?,
        );
    }
    if let Some(b) = m.value_of("lgblock") {
        builder = builder.lgblock(
            b.parse::<i64>()
                .chain_err(|| format!("error parsing block size \"{}\"", b))?,
        );
    }
    if let Some(mode) = m.value_of("mode") {
        builder = builder.mode_name(mode);
    }

    builder.build()
}

fn parse_args() -> Result<(Settings, u64)> {
    let m = App::new(APP_NAME)
        .about(ABOUT_STR)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("log more, repeat for more detail (RUST_LOG takes precedence)"),
        )
        .subcommands(vec![
            SubCommand::with_name("compress")
                .about("compress the input")
                .args(&io_args())
                .arg(
                    Arg::with_name("quality")
                        .short("q")
                        .long("quality")
                        .takes_value(true)
                        .help(QUALITY_HELP),
                )
                .arg(
                    Arg::with_name("lgwin")
                        .short("w")
                        .long("lgwin")
                        .takes_value(true)
                        .help(LGWIN_HELP),
                )
                .arg(
                    Arg::with_name("lgblock")
                        .long("lgblock")
                        .takes_value(true)
                        .help("base 2 logarithm of the input block size, 0 lets the encoder pick"),
                )
                .arg(
                    Arg::with_name("mode")
                        .short("m")
                        .long("mode")
                        .takes_value(true)
                        .possible_values(&["generic", "text", "font"])
                        .help("kind of input, default generic"),
                )
                .arg(
                    Arg::with_name("options")
                        .long("options")
                        .takes_value(true)
                        .help("JSON file with codec options, flags override its values"),
                )
                .arg(
                    Arg::with_name("flush")
                        .long("flush")
                        .help("flush the stream after every read so output is usable early"),
                ),
            SubCommand::with_name("decompress")
                .about("decompress the input")
                .args(&io_args()),
        ])
        .get_matches_safe()
        .chain_err(|| "error parsing arguments")?;

    let verbosity = m.occurrences_of("verbose");

    let (command, sub_m) = match m.subcommand() {
        ("compress", Some(sub_m)) => (
            Command::Compress {
                options: compress_options(sub_m)?,
                flush: sub_m.is_present("flush"),
            },
            sub_m,
        ),
        ("decompress", Some(sub_m)) => (Command::Decompress, sub_m),
        _ => bail!("unknown subcommand"),
    };

    Ok((
        Settings {
            command,
            input: sub_m.value_of("INPUT").map(PathBuf::from),
            output: sub_m.value_of("output").map(PathBuf::from),
            buffered: sub_m.is_present("buffered"),
        },
        verbosity,
    ))
}

fn init_logging(verbosity: u64) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn open_input(path: &Option<PathBuf>) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    let reader: Box<dyn AsyncRead + Unpin + Send> = match path {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .chain_err(|| format!("error opening input \"{}\"", path.display()))?,
        ),
        None => Box::new(tokio::io::stdin()),
    };
    Ok(reader)
}

async fn open_output(path: &Option<PathBuf>) -> Result<Box<dyn AsyncWrite + Unpin + Send>> {
    let writer: Box<dyn AsyncWrite + Unpin + Send> = match path {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .chain_err(|| format!("error creating output \"{}\"", path.display()))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };
    Ok(writer)
}

async fn run_async(settings: Settings) -> Result<()> {
    let mut reader = open_input(&settings.input).await?;
    let mut writer = open_output(&settings.output).await?;

    let written = if settings.buffered {
        let mut input = Vec::new();
        reader
            .read_to_end(&mut input)
            .await
            .chain_err(|| "error reading input")?;
        let output = match settings.command {
            Command::Compress { options, .. } => compress(input, &options).await?,
            Command::Decompress => decompress(input).await?,
        };
        writer
            .write_all(&output)
            .await
            .chain_err(|| "error writing output")?;
        writer.shutdown().await?;
        output.len() as u64
    } else {
        match settings.command {
            Command::Compress { options, flush } => {
                pipe(reader, writer, compress_stream(&options), flush).await?
            }
            Command::Decompress => pipe(reader, writer, decompress_stream(), false).await?,
        }
    };

    info!(written, "done");
    Ok(())
}

fn run() -> Result<()> {
    let (settings, verbosity) = parse_args()?;
    init_logging(verbosity);

    let rt = tokio::runtime::Runtime::new().chain_err(|| "failed to create tokio runtime")?;
    rt.block_on(run_async(settings))
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e.display_chain().to_string());
        std::process::exit(1);
    }
}
