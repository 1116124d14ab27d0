use std::fs;
use std::io;
use std::path;

use env_logger;
use log;

use ext_line_sort::{LineSorter, LineSorterBuilder};

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let input = fs::File::open("input.txt").unwrap();
    let input_size = input.metadata().unwrap().len();
    let output = io::BufWriter::new(fs::File::create("output.txt").unwrap());

    let sorter: LineSorter = LineSorterBuilder::new()
        .with_tmp_dir(path::Path::new("./"))
        .with_available_memory(50 * 1024 * 1024)
        .build()
        .unwrap();

    let strategy = sorter.sort(input, input_size, output).unwrap();
    log::info!("input.txt sorted ({:?})", strategy);
}
