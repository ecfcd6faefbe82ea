pub mod parse;
pub mod report;

use std::io::{self, BufRead, Write};

use histmon_core::{Detail, DetailDecision, ReportError, TimeRange};

/// Print `err` and exit with status 1.
pub fn fail(err: ReportError) -> ! {
    eprintln!("Error: {err}");
    std::process::exit(1);
}

/// Build the time range from the optional bounds, exiting on bad input.
pub fn time_range(start: Option<&str>, end: Option<&str>) -> TimeRange {
    TimeRange::parse(start, end).unwrap_or_else(|e| fail(e))
}

/// Asks on the terminal whether to print every connection.
pub struct PromptDecision;

impl DetailDecision for PromptDecision {
    fn choose(&mut self, connections: usize) -> histmon_core::Result<Detail> {
        let mut out = io::stdout().lock();
        writeln!(out, "  There are {connections} connections.")?;
        writeln!(out, "  Details will be printed for each connection individually")?;
        writeln!(out, "  resulting in a very large output.")?;
        writeln!(out, "  You can shorten this by passing in specific application handles.")?;
        writeln!(out)?;
        write!(
            out,
            "    Enter 1 to print summary of connections only or 2 to print everything: "
        )?;
        out.flush()?;
        drop(out);

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        match answer.trim() {
            "1" => Ok(Detail::SummaryOnly),
            "2" => Ok(Detail::Full),
            other => Err(ReportError::Aborted(format!("invalid input '{other}'"))),
        }
    }
}
