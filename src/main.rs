//! # html-paginate
//!
//! Usage:
//!   html-paginate input.html -o paginated.html
//!   cat input.html | html-paginate --tolerance 80 > paginated.html
//!   html-paginate input.html --debug-log trace.jsonl
//!
//! `HTML_PAGINATOR_LOG=debug` turns on per-decision logging on stderr.

use html_paginator::{Paginator, PaginatorError};
use log::{LevelFilter, Log, Metadata, Record};
use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging() {
    let level = env::var("HTML_PAGINATOR_LOG")
        .ok()
        .and_then(|v| v.trim().parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Warn);
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

#[derive(Default)]
struct Options {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    tolerance: Option<i64>,
    capacity: Option<u32>,
    debug_log: Option<PathBuf>,
    fragment: bool,
    no_page_numbers: bool,
    require_root: bool,
}

const USAGE: &str = "usage: html-paginate [input.html] [-o out.html] [--tolerance PX] [--capacity PX] \
[--debug-log trace.jsonl] [--fragment] [--no-page-numbers] [--require-root]";

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{flag} needs a value"))
        };
        match arg.as_str() {
            "-o" | "--output" => options.output = Some(PathBuf::from(value(arg)?)),
            "--tolerance" => {
                let raw = value(arg)?;
                options.tolerance = Some(
                    raw.parse()
                        .map_err(|_| format!("--tolerance expects pixels, got {raw}"))?,
                );
            }
            "--capacity" => {
                let raw = value(arg)?;
                options.capacity = Some(
                    raw.parse()
                        .map_err(|_| format!("--capacity expects pixels, got {raw}"))?,
                );
            }
            "--debug-log" => options.debug_log = Some(PathBuf::from(value(arg)?)),
            "--fragment" => options.fragment = true,
            "--no-page-numbers" => options.no_page_numbers = true,
            "--require-root" => options.require_root = true,
            flag if flag.starts_with('-') && flag != "-" => {
                return Err(format!("unknown option {flag}"));
            }
            path => {
                if options.input.is_some() {
                    return Err(format!("unexpected argument {path}"));
                }
                if path != "-" {
                    options.input = Some(PathBuf::from(path));
                }
            }
        }
    }
    Ok(options)
}

fn run(options: Options) -> Result<(), PaginatorError> {
    let input = match &options.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let mut builder = Paginator::builder()
        .standalone(!options.fragment)
        .page_numbers(!options.no_page_numbers)
        .require_content_root(options.require_root);
    if let Some(px) = options.tolerance {
        builder = builder.pagination_tolerance(px);
    }
    if let Some(px) = options.capacity {
        builder = builder.content_height_px(px);
    }
    if let Some(path) = options.debug_log {
        builder = builder.debug_log(path);
    }
    let outcome = builder.build()?.paginate_html(&input)?;

    match &options.output {
        Some(path) => fs::write(path, outcome.html.as_bytes())?,
        None => io::stdout().write_all(outcome.html.as_bytes())?,
    }
    eprintln!(
        "{} elements on {} pages; {}",
        outcome.registry.len(),
        outcome.page_count(),
        outcome.audit.verdict
    );
    if !outcome.audit.is_clean() {
        eprintln!("warning: pagination audit reported problems (run with HTML_PAGINATOR_LOG=warn)");
    }
    Ok(())
}

fn main() {
    init_logging();
    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{USAGE}");
        return;
    }
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("{message}\n{USAGE}");
            std::process::exit(2);
        }
    };
    if let Err(err) = run(options) {
        eprintln!("html-paginate: {err}");
        std::process::exit(1);
    }
}
