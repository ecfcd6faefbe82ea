//! Integration tests for histmon-core.
//!
//! These tests run the full pipeline over collection directories written to a
//! temp dir: file discovery → typing → normalization → differencing → report
//! text and JSON.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use histmon_core::report::{self, common_metric_fields, connection};
use histmon_core::{
    Detail, DetailDecision, FixedDecision, LoadOptions, LobResolver, OutputSink, RecordFilter,
    RenderOptions, Renderer, ReportData, ReportError, ReportKind, ReportParams, TimeRange,
    difference, load_group, normalize,
};

const HOUR_DIR: &str = "SAMPLE_2024030110";

/// Write one minute file of `group` holding `rows` under the sample hour.
fn write_minute(base: &Path, group: &str, minute: u32, header: &str, rows: &[String]) {
    let hour = base.join(HOUR_DIR);
    fs::create_dir_all(&hour).unwrap();
    let mut text = format!("{header}\n");
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    fs::write(hour.join(format!("{group}_2024030110{minute:02}.del")), text).unwrap();
}

fn stamp(minute: u32) -> String {
    format!("2024-03-01-10.{minute:02}.00.000000")
}

fn renderer(sink: OutputSink, base: &Path) -> Renderer<Vec<u8>> {
    let opts = RenderOptions {
        sink,
        ..Default::default()
    };
    Renderer::new(Vec::new(), opts, LobResolver::for_dir(base))
}

fn output(r: Renderer<Vec<u8>>) -> String {
    String::from_utf8(r.into_inner()).unwrap()
}

/// Header with the given leading columns followed by every counter the
/// request-metrics block reads.
fn metric_header(leading: &[&str], extra: &[&str]) -> (String, usize) {
    let mut counters: BTreeSet<&str> = common_metric_fields();
    counters.extend(extra);
    for l in leading {
        counters.remove(l);
    }
    let names: Vec<&str> = leading.iter().copied().chain(counters.iter().copied()).collect();
    (names.join(","), counters.len())
}

/// A row of `leading` cells followed by `counters` copies of `value`.
fn metric_row(leading: &[String], counters: usize, value: u64) -> String {
    let mut cells = leading.to_vec();
    cells.extend(std::iter::repeat_n(value.to_string(), counters));
    cells.join(",")
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[test]
fn forward_fill_and_interval_deltas() {
    let dir = tempfile::tempdir().unwrap();
    let header = "COLLECTION_TIME,MEMBER,C";
    let a = [100, 110, 120, 130];
    let b = [Some(100), Some(110), None, Some(130)];
    for minute in 0..4u32 {
        let mut rows = vec![format!("{},0,{}", stamp(minute), a[minute as usize])];
        if let Some(v) = b[minute as usize] {
            rows.push(format!("{},1,{v}", stamp(minute)));
        }
        write_minute(dir.path(), "MON_GET_DATABASE", minute, header, &rows);
    }

    let opts = LoadOptions::new(TimeRange::default()).keyed_by(&["MEMBER"]);
    let set = load_group(dir.path(), "MON_GET_DATABASE", &opts).unwrap();
    let norm = normalize(set, &RecordFilter::new()).unwrap();
    assert_eq!(norm.axis.len(), 4);
    let diff = difference(&norm, 1).unwrap();
    let c = diff.position("C").unwrap();

    assert_eq!(diff.frames.len(), 2);
    assert_eq!(diff.frames[0].context.to_string(), "0");
    assert_eq!(diff.frames[0].column(c), vec![10.0, 10.0, 10.0]);
    assert_eq!(diff.frames[1].column(c), vec![10.0, 0.0, 20.0]);
    for frame in &diff.frames {
        assert_eq!(frame.elapsed(), vec![60.0, 60.0, 60.0]);
    }
}

#[test]
fn constant_counters_give_zero_deltas() {
    let dir = tempfile::tempdir().unwrap();
    for minute in 0..5u32 {
        let row = format!("{},0,42", stamp(minute));
        write_minute(dir.path(), "MON_GET_DATABASE", minute, "COLLECTION_TIME,MEMBER,C", &[row]);
    }
    let set = load_group(
        dir.path(),
        "MON_GET_DATABASE",
        &LoadOptions::new(TimeRange::default()),
    )
    .unwrap();
    let norm = normalize(set, &RecordFilter::new()).unwrap();
    let diff = difference(&norm, 2).unwrap();
    let c = diff.position("C").unwrap();
    assert_eq!(diff.frames[0].column(c), vec![0.0, 0.0, 0.0]);
}

#[test]
fn time_range_prunes_rows() {
    let dir = tempfile::tempdir().unwrap();
    for minute in 0..6u32 {
        let row = format!("{},0,{}", stamp(minute), minute * 10);
        write_minute(dir.path(), "MON_GET_DATABASE", minute, "COLLECTION_TIME,MEMBER,C", &[row]);
    }
    let range = TimeRange::parse(Some("2024-03-01 10:02"), Some("2024-03-01 10:04")).unwrap();
    let set = load_group(dir.path(), "MON_GET_DATABASE", &LoadOptions::new(range)).unwrap();
    let norm = normalize(set, &RecordFilter::new()).unwrap();
    assert_eq!(norm.axis.len(), 3);
}

// ---------------------------------------------------------------------------
// Report sections
// ---------------------------------------------------------------------------

fn dbsummary_fixture(base: &Path) {
    let (header, counters) = metric_header(&["COLLECTION_TIME", "MEMBER"], &[]);
    for minute in 0..4u32 {
        let rows: Vec<String> = (0..2)
            .map(|member| {
                metric_row(
                    &[stamp(minute), member.to_string()],
                    counters,
                    u64::from(minute) * 100 * (member + 1),
                )
            })
            .collect();
        write_minute(base, "MON_GET_DATABASE", minute, &header, &rows);
    }
}

#[test]
fn dbsummary_report_renders_every_interval() {
    let dir = tempfile::tempdir().unwrap();
    dbsummary_fixture(dir.path());

    let params = ReportParams::new(dir.path(), ReportKind::DbSummary);
    let mut r = renderer(OutputSink::Redirected, dir.path());
    let data = report::run(&mut r, &params, &mut FixedDecision(Detail::Full))
        .unwrap()
        .expect("data");
    let text = output(r);

    assert!(text.contains("Replica of MONREPORT.DBSUMMARY"));
    assert!(text.contains("Interval   3: (2024-03-01 10:02:00) - (2024-03-01 10:03:00)"));
    assert!(text.contains("Work volume and throughput"));
    assert!(text.contains("Buffer pool hit ratios"));
    // members 0 and 1 summed: 100 + 200 per minute
    assert!(text.contains(" 1: 300"));

    match data {
        ReportData::Intervals(diff) => {
            assert_eq!(diff.frames.len(), 1);
            assert_eq!(diff.intervals.len(), 3);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn dbsummary_member_filter() {
    let dir = tempfile::tempdir().unwrap();
    dbsummary_fixture(dir.path());

    let mut params = ReportParams::new(dir.path(), ReportKind::DbSummary);
    params.members = vec!["1".into()];
    let mut r = renderer(OutputSink::Redirected, dir.path());
    report::run(&mut r, &params, &mut FixedDecision(Detail::Full)).unwrap();
    let text = output(r);
    assert!(text.contains(" 1: 200"));
    assert!(!text.contains(" 1: 300"));
}

#[test]
fn dbsummary_member_gap_carries_last_value() {
    let dir = tempfile::tempdir().unwrap();
    let (header, counters) = metric_header(&["COLLECTION_TIME", "MEMBER"], &[]);
    for minute in 0..4u32 {
        let m = u64::from(minute);
        let mut rows = vec![metric_row(&[stamp(minute), "0".into()], counters, m * 100)];
        // member 1 misses the 10:02 collection
        if minute != 2 {
            rows.push(metric_row(&[stamp(minute), "1".into()], counters, m * 200));
        }
        write_minute(dir.path(), "MON_GET_DATABASE", minute, &header, &rows);
    }

    let params = ReportParams::new(dir.path(), ReportKind::DbSummary);
    let mut r = renderer(OutputSink::Redirected, dir.path());
    let data = report::run(&mut r, &params, &mut FixedDecision(Detail::Full))
        .unwrap()
        .unwrap();
    let text = output(r);

    let ReportData::Intervals(diff) = data else {
        panic!("expected intervals");
    };
    assert_eq!(diff.frames.len(), 1);
    let counter = common_metric_fields().into_iter().next().unwrap();
    let idx = diff.position(counter).unwrap();
    assert_eq!(diff.frames[0].column(idx), vec![300.0, 100.0, 500.0]);
    assert!(!text.contains("-100"));
}

#[test]
fn missing_counter_fails_before_header() {
    let dir = tempfile::tempdir().unwrap();
    for minute in 0..3u32 {
        let row = format!("{},0,{}", stamp(minute), minute);
        write_minute(dir.path(), "MON_GET_DATABASE", minute, "COLLECTION_TIME,MEMBER,C", &[row]);
    }

    let params = ReportParams::new(dir.path(), ReportKind::DbSummary);
    let mut r = renderer(OutputSink::Redirected, dir.path());
    let err = report::run(&mut r, &params, &mut FixedDecision(Detail::Full)).unwrap_err();
    assert!(matches!(err, ReportError::UnknownField(_)));
    assert_eq!(output(r), "");
}

#[test]
fn report_json_is_tagged() {
    let dir = tempfile::tempdir().unwrap();
    dbsummary_fixture(dir.path());

    let params = ReportParams::new(dir.path(), ReportKind::DbSummary);
    let mut r = renderer(OutputSink::Redirected, dir.path());
    let data = report::run(&mut r, &params, &mut FixedDecision(Detail::Full))
        .unwrap()
        .unwrap();
    let json = serde_json::to_value(&data).unwrap();
    assert_eq!(json["kind"], "intervals");
    assert_eq!(json["group"], "MON_GET_DATABASE");
    assert_eq!(json["frames"][0]["records"][0]["elapsed_secs"], 60.0);
}

#[test]
fn missing_collection_prints_notice() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join(HOUR_DIR)).unwrap();

    let params = ReportParams::new(dir.path(), ReportKind::Connection);
    let mut r = renderer(OutputSink::Redirected, dir.path());
    let data = report::run(&mut r, &params, &mut FixedDecision(Detail::Full)).unwrap();
    assert!(data.is_none());
    let text = output(r);
    assert!(text.contains("no MON_GET_CONNECTION files found"));
    assert!(text.contains("No collection data available"));
}

#[test]
fn zero_period_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut params = ReportParams::new(dir.path(), ReportKind::DbSummary);
    params.period = 0;
    let mut r = renderer(OutputSink::Redirected, dir.path());
    let err = report::run(&mut r, &params, &mut FixedDecision(Detail::Full)).unwrap_err();
    assert!(matches!(err, ReportError::InvalidPeriod(0)));
}

fn connection_fixture(base: &Path, connections: u32) {
    let leading = [
        "COLLECTION_TIME",
        "MEMBER",
        "APPLICATION_HANDLE",
        "APPLICATION_NAME",
        "APPLICATION_ID",
    ];
    let (header, counters) = metric_header(&leading, &connection::SUMMARY_METRICS);
    for minute in 0..3u32 {
        let rows: Vec<String> = (0..connections)
            .map(|h| {
                metric_row(
                    &[
                        stamp(minute),
                        "0".into(),
                        (h + 10).to_string(),
                        "db2bp".into(),
                        format!("*LOCAL.db2inst1.{h}"),
                    ],
                    counters,
                    u64::from(minute) * u64::from(h + 1),
                )
            })
            .collect();
        write_minute(base, "MON_GET_CONNECTION", minute, &header, &rows);
    }
}

/// Records how often it was asked.
struct Counting {
    asked: usize,
    answer: Detail,
}

impl DetailDecision for Counting {
    fn choose(&mut self, _connections: usize) -> histmon_core::Result<Detail> {
        self.asked += 1;
        Ok(self.answer)
    }
}

#[test]
fn connection_report_compares_connections() {
    let dir = tempfile::tempdir().unwrap();
    connection_fixture(dir.path(), 2);

    let params = ReportParams::new(dir.path(), ReportKind::Connection);
    let mut r = renderer(OutputSink::Redirected, dir.path());
    report::run(&mut r, &params, &mut FixedDecision(Detail::Full)).unwrap();
    let text = output(r);

    assert!(text.contains("Connection details: Handle = 10, Name = db2bp, ID = *LOCAL.db2inst1.0"));
    assert!(text.contains("Comparison across connections"));
    assert!(text.contains("    2: Handle = 11, Name = db2bp"));
    assert!(text.contains("Details for each connection"));
}

#[test]
fn connection_application_handle_filter() {
    let dir = tempfile::tempdir().unwrap();
    connection_fixture(dir.path(), 3);

    let mut params = ReportParams::new(dir.path(), ReportKind::Connection);
    params.application_handles = vec!["11".into()];
    let mut r = renderer(OutputSink::Redirected, dir.path());
    let data = report::run(&mut r, &params, &mut FixedDecision(Detail::Full))
        .unwrap()
        .unwrap();
    let ReportData::Intervals(diff) = data else {
        panic!("expected intervals");
    };
    assert_eq!(diff.frames.len(), 1);
    assert!(!output(r).contains("Comparison across connections"));
}

#[test]
fn many_connections_ask_on_terminal_only() {
    let dir = tempfile::tempdir().unwrap();
    connection_fixture(dir.path(), 5);
    let params = ReportParams::new(dir.path(), ReportKind::Connection);

    let mut decision = Counting {
        asked: 0,
        answer: Detail::SummaryOnly,
    };
    let mut r = renderer(OutputSink::Interactive, dir.path());
    report::run(&mut r, &params, &mut decision).unwrap();
    assert_eq!(decision.asked, 1);
    let text = output(r);
    assert!(text.contains("Summary of connections"));
    assert!(!text.contains("Details for each connection"));

    let mut r = renderer(OutputSink::Redirected, dir.path());
    report::run(&mut r, &params, &mut decision).unwrap();
    assert_eq!(decision.asked, 1);
    assert!(output(r).contains("Details for each connection"));
}

#[test]
fn aborted_decision_fails_the_report() {
    struct Refuse;
    impl DetailDecision for Refuse {
        fn choose(&mut self, _connections: usize) -> histmon_core::Result<Detail> {
            Err(ReportError::Aborted("invalid choice".into()))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    connection_fixture(dir.path(), 4);
    let params = ReportParams::new(dir.path(), ReportKind::Connection);
    let mut r = renderer(OutputSink::Interactive, dir.path());
    let err = report::run(&mut r, &params, &mut Refuse).unwrap_err();
    assert!(matches!(err, ReportError::Aborted(_)));
}

#[test]
fn connection_members_fill_separately_and_handles_sort_numerically() {
    let dir = tempfile::tempdir().unwrap();
    let leading = [
        "COLLECTION_TIME",
        "MEMBER",
        "APPLICATION_HANDLE",
        "APPLICATION_NAME",
        "APPLICATION_ID",
    ];
    let (header, counters) = metric_header(&leading, &connection::SUMMARY_METRICS);
    for minute in 0..3u32 {
        let m = u64::from(minute);
        let cells = |member: &str, handle: &str| {
            vec![
                stamp(minute),
                member.to_string(),
                handle.to_string(),
                "db2bp".to_string(),
                format!("*LOCAL.db2inst1.{handle}"),
            ]
        };
        let mut rows = vec![
            metric_row(&cells("0", "10"), counters, m),
            metric_row(&cells("0", "9"), counters, m * 10),
        ];
        // handle 9 on member 1 misses the 10:01 collection
        if minute != 1 {
            rows.push(metric_row(&cells("1", "9"), counters, 100 + m * 100));
        }
        write_minute(dir.path(), "MON_GET_CONNECTION", minute, &header, &rows);
    }

    let params = ReportParams::new(dir.path(), ReportKind::Connection);
    let mut r = renderer(OutputSink::Redirected, dir.path());
    let data = report::run(&mut r, &params, &mut FixedDecision(Detail::Full))
        .unwrap()
        .unwrap();
    let text = output(r);

    assert!(text.contains("    1: Handle = 9, Name = db2bp"));
    assert!(text.contains("    2: Handle = 10, Name = db2bp"));

    let ReportData::Intervals(diff) = data else {
        panic!("expected intervals");
    };
    assert_eq!(diff.frames.len(), 2);
    assert_eq!(diff.frames[0].context.parts()[0], "9");
    let cpu = diff.position("TOTAL_CPU_TIME").unwrap();
    assert_eq!(diff.frames[0].column(cpu), vec![10.0, 210.0]);
    assert_eq!(diff.frames[1].column(cpu), vec![1.0, 1.0]);
}

const PKG_HEADER: &str = "COLLECTION_TIME,MEMBER,EXECUTABLE_ID,STMT_TEXT,TOTAL_CPU_TIME,\
TOTAL_ACT_WAIT_TIME,LOCK_WAIT_TIME,ROWS_READ,ROWS_MODIFIED,NUM_EXECUTIONS,POOL_READ_TIME,\
POOL_WRITE_TIME,DIRECT_READ_TIME,DIRECT_WRITE_TIME";

fn pkgcache_fixture(base: &Path) {
    let lob = base.join(HOUR_DIR).join("lob");
    fs::create_dir_all(&lob).unwrap();
    let texts = "SELECT * FROM SYSCAT.TABLESUPDATE STAFF SET SALARY = SALARY * 1.1";
    fs::write(lob.join("db2lob.001"), texts).unwrap();

    for minute in 0..3u32 {
        let m = u64::from(minute);
        let rows = vec![
            format!(
                "{},0,x'01',db2lob.001.0.27.,{},5,1,10,0,{},0,0,0,0",
                stamp(minute),
                100 * m,
                m + 1
            ),
            format!(
                "{},0,x'02',db2lob.001.27.38.,{},9,2,20,1,1,1,1,1,1",
                stamp(minute),
                [0, 900, 300][minute as usize]
            ),
        ];
        write_minute(base, "MON_GET_PKG_CACHE_STMT", minute, PKG_HEADER, &rows);
    }
}

#[test]
fn pkgcache_ranks_statements_by_peak() {
    let dir = tempfile::tempdir().unwrap();
    pkgcache_fixture(dir.path());

    let params = ReportParams::new(dir.path(), ReportKind::PkgCache);
    let mut r = renderer(OutputSink::Redirected, dir.path());
    let data = report::run(&mut r, &params, &mut FixedDecision(Detail::Full))
        .unwrap()
        .unwrap();
    let text = output(r);

    assert!(text.contains("Replica of MONREPORT.PKGCACHE"));
    assert!(text.contains("Top 10 statements by TOTAL_CPU_TIME"));
    assert!(text.contains("Top 10 statements by I/O wait time per exec"));

    let cpu = text.find("Top 10 statements by TOTAL_CPU_TIME").unwrap();
    let update = text[cpu..].find("UPDATE STAFF").unwrap();
    let select = text[cpu..].find("SELECT * FROM SYSCAT.TABLES").unwrap();
    assert!(update < select, "higher CPU peak listed first");
    assert!(text.contains("900"));
    assert!(text.contains("2024-03-01 10:01:00"));

    let ReportData::Statements { times, statements } = data else {
        panic!("expected statements");
    };
    assert_eq!(times.len(), 3);
    assert_eq!(statements.len(), 2);
}

#[test]
fn pkgcache_truncates_text_on_terminal() {
    let dir = tempfile::tempdir().unwrap();
    pkgcache_fixture(dir.path());

    let params = ReportParams::new(dir.path(), ReportKind::PkgCache);
    let opts = RenderOptions {
        sink: OutputSink::Interactive,
        text_width: 20,
        ..Default::default()
    };
    let mut r = Renderer::new(Vec::new(), opts, LobResolver::for_dir(dir.path()));
    report::run(&mut r, &params, &mut FixedDecision(Detail::Full)).unwrap();
    let text = output(r);
    assert!(text.contains("UPDATE STAFF SET ..."));
    assert!(!text.contains("SALARY * 1.1"));
}

#[test]
fn pkgcache_member_gap_keeps_peak() {
    let dir = tempfile::tempdir().unwrap();
    let lob = dir.path().join(HOUR_DIR).join("lob");
    fs::create_dir_all(&lob).unwrap();
    fs::write(lob.join("db2lob.001"), "SELECT * FROM SYSCAT.TABLES").unwrap();

    let cpu0 = [100, 200, 210];
    let cpu1 = [Some(50), Some(100), None];
    for minute in 0..3u32 {
        let i = minute as usize;
        let row = |member: u32, cpu: u64| {
            format!(
                "{},{member},x'01',db2lob.001.0.27.,{cpu},0,0,0,0,1,0,0,0,0",
                stamp(minute)
            )
        };
        let mut rows = vec![row(0, cpu0[i])];
        if let Some(cpu) = cpu1[i] {
            rows.push(row(1, cpu));
        }
        write_minute(dir.path(), "MON_GET_PKG_CACHE_STMT", minute, PKG_HEADER, &rows);
    }

    let params = ReportParams::new(dir.path(), ReportKind::PkgCache);
    let mut r = renderer(OutputSink::Redirected, dir.path());
    let data = report::run(&mut r, &params, &mut FixedDecision(Detail::Full))
        .unwrap()
        .unwrap();
    let text = output(r);

    let ReportData::Statements { statements, .. } = data else {
        panic!("expected statements");
    };
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].executable_id, "x'01'");
    let peak = statements[0].peaks["TOTAL_CPU_TIME"];
    assert_eq!(peak.value, 310.0);
    assert_eq!(peak.at.to_string(), "2024-03-01 10:02:00");
    assert!(text.contains("310"));
}
