use std::io::{self, Write};
use std::path::PathBuf;

use histmon_core::{ParseDisplay, ParseOptions, ReportError, tabulate};

use super::{fail, time_range};

pub struct ParseCommandConfig<'a> {
    pub path: PathBuf,
    pub collection: &'a str,
    pub display: &'a str,
    pub start_time: Option<&'a str>,
    pub end_time: Option<&'a str>,
    pub application_handle: Option<String>,
}

pub fn run(cfg: ParseCommandConfig<'_>) {
    if !cfg.path.is_dir() {
        eprintln!("Raw data folder is not found: {}", cfg.path.display());
        std::process::exit(1);
    }

    let display = match cfg.display {
        "summary" => ParseDisplay::Summary,
        _ => ParseDisplay::Details,
    };
    let opts = ParseOptions {
        range: time_range(cfg.start_time, cfg.end_time),
        display,
        application_handle: cfg.application_handle,
    };

    let table = match tabulate(&cfg.path, cfg.collection, &opts) {
        Ok(t) => t,
        Err(ReportError::NoData(group)) => {
            eprintln!("Data not found for {group}");
            std::process::exit(1);
        }
        Err(e) => fail(e),
    };

    let mut out = io::stdout().lock();
    let written = table.write_to(&mut out).and_then(|()| {
        if display == ParseDisplay::Details {
            writeln!(
                out,
                "Printing the output into a file with no wrap provides a more readable view."
            )?;
        }
        Ok(())
    });
    if let Err(e) = written {
        fail(e.into());
    }
}
