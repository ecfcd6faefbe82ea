use std::io;
use std::path::PathBuf;

use histmon_core::report;
use histmon_core::{
    LobResolver, OutputSink, RenderOptions, Renderer, ReportData, ReportError, ReportKind,
    ReportParams,
};

use super::{PromptDecision, fail, time_range};

pub struct ReportCommandConfig<'a> {
    pub path: PathBuf,
    pub kind: ReportKind,
    pub start_time: Option<&'a str>,
    pub end_time: Option<&'a str>,
    pub period: usize,
    pub stats: bool,
    pub members: &'a [i64],
    pub application_handles: &'a [i64],
    pub output_path: Option<&'a str>,
}

pub fn run(cfg: ReportCommandConfig<'_>) {
    if !cfg.path.is_dir() {
        eprintln!("Collection path not found: {}", cfg.path.display());
        std::process::exit(1);
    }

    let mut params = ReportParams::new(cfg.path, cfg.kind);
    params.range = time_range(cfg.start_time, cfg.end_time);
    params.period = cfg.period;
    params.members = cfg.members.iter().map(i64::to_string).collect();
    params.application_handles = cfg.application_handles.iter().map(i64::to_string).collect();

    let opts = RenderOptions {
        sink: OutputSink::detect(),
        stats: cfg.stats,
        ..Default::default()
    };
    log::debug!("output sink: {:?}", opts.sink);
    let lobs = LobResolver::for_dir(&params.base);
    let mut renderer = Renderer::new(io::stdout(), opts, lobs);

    let data = match report::run(&mut renderer, &params, &mut PromptDecision) {
        Ok(data) => data,
        Err(e) => fail(e),
    };

    if let Some(path) = cfg.output_path {
        match data {
            Some(data) => write_json(path, &data),
            None => eprintln!("No report data to write to {path}"),
        }
    }
}

fn write_json(path: &str, data: &ReportData) {
    let json = serde_json::to_string_pretty(data).unwrap_or_else(|e| fail(ReportError::Json(e)));
    match std::fs::write(path, json) {
        Ok(()) => eprintln!("Report data written to {path}"),
        Err(e) => {
            eprintln!("Failed to write {path}: {e}");
            std::process::exit(1);
        }
    }
}
