use std::fs;
use std::io::prelude::*;
use std::process;
use std::time::Instant;

use bufsort::{BufferPool, Sorter};

fn main() {
    env_logger::init();

    let args = build_arg_parser();

    let data_file = args.value_of("data_file").expect("value is required");
    let num_buffers: usize = args
        .value_of("num_buffers")
        .expect("value is required")
        .parse()
        .expect("value is pre-validated");
    let stat_file = args.value_of("stat_file").expect("value is required");

    let pool = match BufferPool::open(data_file, num_buffers) {
        Ok(pool) => pool,
        Err(err) => {
            log::error!("buffer pool opening error: {}", err);
            process::exit(1);
        }
    };
    let file_len = pool.file_len();

    let mut sorter = match Sorter::new(pool, file_len) {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    let start = Instant::now();
    if let Err(err) = sorter.sort() {
        log::error!("sorting error: {}", err);
        process::exit(1);
    }
    let elapsed = start.elapsed();

    let pool = sorter.into_pool();
    let cache_hits = pool.cache_hits();
    let disk_reads = pool.disk_reads();
    let disk_writes = pool.disk_writes();

    if let Err(err) = pool.close() {
        log::error!("buffer pool closing error: {}", err);
        process::exit(1);
    }

    let stats = fs::OpenOptions::new().create(true).append(true).open(stat_file);
    let mut stats = match stats {
        Ok(stats) => stats,
        Err(err) => {
            log::error!("statistics file opening error: {}", err);
            process::exit(1);
        }
    };

    if let Err(err) = writeln!(
        stats,
        "File: {}\nCache Hits: {}\nDisk Reads: {}\nDisk Writes: {}\nSort Time (ms): {}\n",
        data_file,
        cache_hits,
        disk_reads,
        disk_writes,
        elapsed.as_millis()
    ) {
        log::error!("statistics saving error: {}", err);
        process::exit(1);
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("bufsort")
        .about("sorts a file of fixed-size records in place through an LRU buffer pool")
        .arg(
            clap::Arg::new("data_file")
                .help("file of 4-byte records to be sorted in place")
                .required(true)
                .index(1),
        )
        .arg(
            clap::Arg::new("num_buffers")
                .help("buffer pool capacity, in blocks")
                .required(true)
                .index(2)
                .validator(|v| match v.parse::<usize>() {
                    Ok(n) if n >= 1 => Ok(()),
                    Ok(_) => Err("buffer count must be at least 1".to_string()),
                    Err(err) => Err(format!("buffer count format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("stat_file")
                .help("statistics file the sort summary is appended to")
                .required(true)
                .index(3),
        )
        .get_matches()
}
