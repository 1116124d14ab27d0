use std::cmp::Ordering;
use std::path;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use ext_line_sort::{ascending, descending, LineEnding, LineSorter, LineSorterBuilder};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let order: Order = arg_parser.value_of_t_or_exit("sort");
    let line_ending: Eol = arg_parser.value_of_t_or_exit("eol");
    let tmp_dir: Option<&str> = arg_parser.value_of("tmp_dir");
    let memory = arg_parser.value_of("memory").expect("value is required");
    let buf_size = arg_parser.value_of("buf_size").expect("value has default");
    let force_external = arg_parser.is_present("force_external");
    let threads: Option<usize> = arg_parser
        .is_present("threads")
        .then(|| arg_parser.value_of_t_or_exit("threads"));

    let input = arg_parser.value_of("input").expect("value is required");
    let output = arg_parser.value_of("output").expect("value is required");

    let mut sorter_builder = LineSorterBuilder::new()
        .with_available_memory(memory.parse::<ByteSize>().expect("value is pre-validated").as_u64())
        .with_rw_buf_size(parse_buf_size(buf_size).expect("value is pre-validated"))
        .with_force_external(force_external)
        .with_line_ending(match line_ending {
            Eol::Lf => LineEnding::Lf,
            Eol::Crlf => LineEnding::CrLf,
        });

    if let Some(threads) = threads {
        sorter_builder = sorter_builder.with_threads_number(threads);
    }

    if let Some(tmp_dir) = tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    let sorter: LineSorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    let compare: fn(&[u8], &[u8]) -> Ordering = match order {
        Order::Asc => ascending,
        Order::Desc => descending,
    };

    match sorter.sort_file_by(path::Path::new(input), path::Path::new(output), compare) {
        Ok(strategy) => log::info!("{} sorted into {} ({:?})", input, output, strategy),
        Err(err) => {
            log::error!("data sorting error: {}", err);
            process::exit(1);
        }
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Order::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Order as clap::ArgEnum>::from_str(s, false)
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum Eol {
    Lf,
    Crlf,
}

impl Eol {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Eol::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for Eol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Eol as clap::ArgEnum>::from_str(s, false)
    }
}

fn validate_size(value: &str) -> Result<(), String> {
    match value.parse::<ByteSize>() {
        Ok(size) if size.as_u64() > 0 => Ok(()),
        Ok(_) => Err("size must be positive".to_string()),
        Err(err) => Err(format!("size format incorrect: {}", err)),
    }
}

fn parse_buf_size(value: &str) -> Result<usize, String> {
    let size = value
        .parse::<ByteSize>()
        .map_err(|err| format!("size format incorrect: {}", err))?;

    match usize::try_from(size.as_u64()) {
        Ok(0) => Err("size must be positive".to_string()),
        Ok(size) => Ok(size),
        Err(_) => Err(format!("size {} is too large for this platform", size)),
    }
}

fn validate_buf_size(value: &str) -> Result<(), String> {
    parse_buf_size(value).map(|_| ())
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("ext-line-sort")
        .about("sorts lines of a text file in memory or by external merge sort")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("file to be sorted")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("memory")
                .short('m')
                .long("memory")
                .help("memory available for sorting, also used as the chunk size")
                .required(true)
                .takes_value(true)
                .validator(validate_size),
        )
        .arg(
            clap::Arg::new("sort")
                .short('s')
                .long("sort")
                .help("sorting order")
                .takes_value(true)
                .default_value("asc")
                .possible_values(Order::possible_values()),
        )
        .arg(
            clap::Arg::new("eol")
                .short('e')
                .long("eol")
                .help("output line terminator")
                .takes_value(true)
                .default_value("lf")
                .possible_values(Eol::possible_values()),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("threads")
                .short('t')
                .long("threads")
                .help("number of threads to use for parallel chunk sorting")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary data")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("buf_size")
                .short('b')
                .long("buf-size")
                .help("read/write buffer size")
                .takes_value(true)
                .default_value("64KiB")
                .validator(validate_buf_size),
        )
        .arg(
            clap::Arg::new("force_external")
                .short('x')
                .long("force-external")
                .help("use external merge sort even if the input fits in memory"),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
