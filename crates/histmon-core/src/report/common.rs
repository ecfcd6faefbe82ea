//! Request metrics shared by the database and connection reports.
//!
//! The section is a fixed list of [`Line`]s. Every numeric line is evaluated
//! over one differenced frame and printed as a series across intervals.
//! Ratios whose denominator is zero for an interval show `inf` or `NaN`.

use std::collections::BTreeSet;
use std::io::Write;

use crate::diff::{Differenced, DifferencedFrame};
use crate::error::Result;
use crate::lob::BlobSource;
use crate::render::{Renderer, Separator};

/// A per-interval quantity computed from counter deltas.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Expr {
    Field(&'static str),
    Add(&'static str, &'static str),
    Sub(&'static str, &'static str),
    /// `a + b - c`
    AddSub(&'static str, &'static str, &'static str),
    /// Interval length in seconds.
    Elapsed,
}

#[derive(Debug, Clone, Copy)]
enum Scale {
    Plain,
    /// Times 100, printed with a `%` suffix.
    Percent,
    /// Times 100, no suffix.
    Hundred,
}

#[derive(Debug, Clone, Copy)]
enum Line {
    Heading(&'static str),
    Sep(Separator),
    Value(&'static str, Expr),
    Ratio(&'static str, Expr, Expr, Scale),
    /// `(1 - misses / reads) * 100`
    HitRatio(&'static str, Expr, Expr),
    Formula(&'static str),
}

use Expr::{Add, AddSub, Elapsed, Field as F, Sub};
use Line::{Formula, Heading, HitRatio, Ratio, Sep, Value as V};
use Scale::{Hundred, Percent, Plain};

const BLANK: Line = Sep(Separator::Blank);
const DASHED: Line = Sep(Separator::Dashed);

const WAIT: Expr = F("TOTAL_WAIT_TIME");
const PROC: Expr = Sub("TOTAL_RQST_TIME", "TOTAL_WAIT_TIME");
const ACTS: Expr = F("ACT_COMPLETED_TOTAL");

const PCT_WAIT: &str = "    Percent of total wait time";
const PCT_WAIT_TOP: &str = "  Percent of total wait time";
const PCT_PROC: &str = "    Percent of total proc time";

#[rustfmt::skip]
const LINES: &[Line] = &[
    Heading("Work volume and throughput"),
    DASHED,
    V("TOTAL_APP_COMMITS", F("TOTAL_APP_COMMITS")),
    Ratio("  Per second", F("TOTAL_APP_COMMITS"), Elapsed, Plain),
    V("ACT_COMPLETED_TOTAL", ACTS),
    Ratio("  Per second", ACTS, Elapsed, Plain),
    V("APP_RQSTS_COMPLETED_TOTAL", F("APP_RQSTS_COMPLETED_TOTAL")),
    Ratio("  Per second", F("APP_RQSTS_COMPLETED_TOTAL"), Elapsed, Plain),
    BLANK,
    V("TOTAL_CPU_TIME", F("TOTAL_CPU_TIME")),
    Ratio("  Per request", F("TOTAL_CPU_TIME"), F("APP_RQSTS_COMPLETED_TOTAL"), Plain),
    BLANK,
    Heading("Row processing"),
    Ratio("  ROWS_READ/ROWS_RETURNED", F("ROWS_READ"), F("ROWS_RETURNED"), Plain),
    V("    ROWS_READ", F("ROWS_READ")),
    V("    ROWS_RETURNED", F("ROWS_RETURNED")),
    V("  ROWS_MODIFIED", F("ROWS_MODIFIED")),
    BLANK,

    Heading("Wait times"),
    DASHED,
    Heading("-- Wait time as a percentage of elapsed time --"),
    BLANK,
    Heading("For requests"),
    Ratio("  Percent Wait time/Total time", WAIT, F("TOTAL_RQST_TIME"), Percent),
    V("    Wait time", WAIT),
    V("    Total time", F("TOTAL_RQST_TIME")),
    Heading("For activities"),
    Ratio("  Percent Wait time/Total time", F("TOTAL_ACT_WAIT_TIME"), F("TOTAL_ACT_TIME"), Percent),
    V("    Wait time", F("TOTAL_ACT_WAIT_TIME")),
    V("    Total time", F("TOTAL_ACT_TIME")),
    BLANK,
    Heading("-- Time waiting for next client request --"),
    BLANK,
    V("CLIENT_IDLE_WAIT_TIME", F("CLIENT_IDLE_WAIT_TIME")),
    Ratio("  Per second", F("CLIENT_IDLE_WAIT_TIME"), Elapsed, Plain),
    BLANK,
    Heading("-- Detailed breakdown of TOTAL_WAIT_TIME --"),
    BLANK,
    V("TOTAL_WAIT_TIME", WAIT),
    BLANK,
    Heading("I/O wait time"),
    V("  POOL_READ_TIME", F("POOL_READ_TIME")),
    Ratio(PCT_WAIT, F("POOL_READ_TIME"), WAIT, Percent),
    V("  POOL_WRITE_TIME", F("POOL_WRITE_TIME")),
    Ratio(PCT_WAIT, F("POOL_WRITE_TIME"), WAIT, Percent),
    V("  DIRECT_READ_TIME", F("DIRECT_READ_TIME")),
    Ratio(PCT_WAIT, F("DIRECT_READ_TIME"), WAIT, Percent),
    V("  DIRECT_WRITE_TIME", F("DIRECT_WRITE_TIME")),
    Ratio(PCT_WAIT, F("DIRECT_WRITE_TIME"), WAIT, Percent),
    V("  LOG_DISK_WAIT_TIME", F("LOG_DISK_WAIT_TIME")),
    Ratio(PCT_WAIT, F("LOG_DISK_WAIT_TIME"), WAIT, Percent),
    V("LOCK_WAIT_TIME", F("LOCK_WAIT_TIME")),
    Ratio(PCT_WAIT_TOP, F("LOCK_WAIT_TIME"), WAIT, Percent),
    V("AGENT_WAIT_TIME", F("AGENT_WAIT_TIME")),
    Ratio(PCT_WAIT_TOP, F("AGENT_WAIT_TIME"), WAIT, Percent),
    Heading("Network and FCM"),
    V("  TCPIP_SEND_WAIT_TIME", F("TCPIP_SEND_WAIT_TIME")),
    Ratio(PCT_WAIT, F("TCPIP_SEND_WAIT_TIME"), WAIT, Percent),
    V("  TCPIP_RECV_WAIT_TIME", F("TCPIP_RECV_WAIT_TIME")),
    Ratio(PCT_WAIT, F("TCPIP_RECV_WAIT_TIME"), WAIT, Percent),
    V("  IPC_SEND_WAIT_TIME", F("IPC_SEND_WAIT_TIME")),
    Ratio(PCT_WAIT, F("IPC_SEND_WAIT_TIME"), WAIT, Percent),
    V("  IPC_RECV_WAIT_TIME", F("IPC_RECV_WAIT_TIME")),
    Ratio(PCT_WAIT, F("IPC_RECV_WAIT_TIME"), WAIT, Percent),
    V("  FCM_SEND_WAIT_TIME", F("FCM_SEND_WAIT_TIME")),
    Ratio(PCT_WAIT, F("FCM_SEND_WAIT_TIME"), WAIT, Percent),
    V("  FCM_RECV_WAIT_TIME", F("FCM_RECV_WAIT_TIME")),
    Ratio(PCT_WAIT, F("FCM_RECV_WAIT_TIME"), WAIT, Percent),
    V("WLM_QUEUE_TIME_TOTAL", F("WLM_QUEUE_TIME_TOTAL")),
    Ratio(PCT_WAIT_TOP, F("WLM_QUEUE_TIME_TOTAL"), WAIT, Percent),
    V("CF_WAIT_TIME", F("CF_WAIT_TIME")),
    Ratio(PCT_WAIT_TOP, F("CF_WAIT_TIME"), WAIT, Percent),
    V("RECLAIM_WAIT_TIME", F("RECLAIM_WAIT_TIME")),
    Ratio(PCT_WAIT_TOP, F("RECLAIM_WAIT_TIME"), WAIT, Percent),
    V("SMP_RECLAIM_WAIT_TIME", F("SPACEMAPPAGE_RECLAIM_WAIT_TIME")),
    Ratio(PCT_WAIT_TOP, F("SPACEMAPPAGE_RECLAIM_WAIT_TIME"), WAIT, Percent),
    BLANK,

    Heading("Component times"),
    DASHED,
    Heading("-- Detailed breakdown of processing time --"),
    BLANK,
    V("Total processing", PROC),
    BLANK,
    Heading("Section execution"),
    V("  TOTAL_SECTION_PROC_TIME", F("TOTAL_SECTION_PROC_TIME")),
    Ratio(PCT_PROC, F("TOTAL_SECTION_PROC_TIME"), PROC, Percent),
    V("  TOTAL_SECTION_SORT_PROC_TIME", F("TOTAL_SECTION_SORT_PROC_TIME")),
    Ratio(PCT_PROC, F("TOTAL_SECTION_SORT_PROC_TIME"), PROC, Percent),
    Heading("Compile"),
    V("  TOTAL_COMPILE_PROC_TIME", F("TOTAL_COMPILE_PROC_TIME")),
    Ratio(PCT_PROC, F("TOTAL_COMPILE_PROC_TIME"), PROC, Percent),
    V("  TOTAL_IMPLICIT_COMPILE_PROC_TIME", F("TOTAL_IMPLICIT_COMPILE_PROC_TIME")),
    Ratio(PCT_PROC, F("TOTAL_IMPLICIT_COMPILE_PROC_TIME"), PROC, Percent),
    Heading("Transaction end processing"),
    V("  TOTAL_COMMIT_PROC_TIME", F("TOTAL_COMMIT_PROC_TIME")),
    Ratio(PCT_PROC, F("TOTAL_COMMIT_PROC_TIME"), PROC, Percent),
    V("  TOTAL_ROLLBACK_PROC_TIME", F("TOTAL_ROLLBACK_PROC_TIME")),
    Ratio(PCT_PROC, F("TOTAL_ROLLBACK_PROC_TIME"), PROC, Percent),
    Heading("Utilities"),
    V("  TOTAL_RUNSTATS_PROC_TIME", F("TOTAL_RUNSTATS_PROC_TIME")),
    Ratio(PCT_PROC, F("TOTAL_RUNSTATS_PROC_TIME"), PROC, Percent),
    V("  TOTAL_REORGS_PROC_TIME", F("TOTAL_REORG_PROC_TIME")),
    Ratio(PCT_PROC, F("TOTAL_REORG_PROC_TIME"), PROC, Percent),
    V("  TOTAL_LOAD_PROC_TIME", F("TOTAL_LOAD_PROC_TIME")),
    Ratio(PCT_PROC, F("TOTAL_LOAD_PROC_TIME"), PROC, Percent),
    BLANK,

    Heading("Buffer pool"),
    DASHED,
    Heading("Buffer pool hit ratios"),
    BLANK,
    HitRatio("Data hit ratio",
        AddSub("POOL_DATA_P_READS", "POOL_TEMP_DATA_P_READS", "POOL_ASYNC_DATA_READS"),
        Add("POOL_DATA_L_READS", "POOL_TEMP_DATA_L_READS")),
    V("  POOL_DATA_P_READS", F("POOL_DATA_P_READS")),
    V("  POOL_TEMP_DATA_P_READS", F("POOL_TEMP_DATA_P_READS")),
    V("  POOL_ASYNC_DATA_READS", F("POOL_ASYNC_DATA_READS")),
    V("  POOL_DATA_L_READS", F("POOL_DATA_L_READS")),
    V("  POOL_TEMP_DATA_L_READS", F("POOL_TEMP_DATA_L_READS")),
    Formula("( 1 - ( POOL_DATA_P_READS + POOL_TEMP_DATA_P_READS - POOL_ASYNC_DATA_READS ) / ( POOL_DATA_L_READS + POOL_TEMP_DATA_L_READS ) ) * 100"),
    HitRatio("Index hit ratio",
        AddSub("POOL_INDEX_P_READS", "POOL_TEMP_INDEX_P_READS", "POOL_ASYNC_INDEX_READS"),
        Add("POOL_INDEX_L_READS", "POOL_TEMP_INDEX_L_READS")),
    V("  POOL_INDEX_P_READS", F("POOL_INDEX_P_READS")),
    V("  POOL_TEMP_INDEX_P_READS", F("POOL_TEMP_INDEX_P_READS")),
    V("  POOL_ASYNC_INDEX_READS", F("POOL_ASYNC_INDEX_READS")),
    V("  POOL_INDEX_L_READS", F("POOL_INDEX_L_READS")),
    V("  POOL_TEMP_INDEX_L_READS", F("POOL_TEMP_INDEX_L_READS")),
    Formula("( 1 - ( POOL_INDEX_P_READS + POOL_TEMP_INDEX_P_READS - POOL_ASYNC_INDEX_READS ) / ( POOL_INDEX_L_READS + POOL_TEMP_INDEX_L_READS ) ) * 100"),
    HitRatio("XDA hit ratio",
        AddSub("POOL_XDA_P_READS", "POOL_TEMP_XDA_P_READS", "POOL_ASYNC_XDA_READS"),
        Add("POOL_XDA_L_READS", "POOL_TEMP_XDA_L_READS")),
    V("  POOL_XDA_P_READS", F("POOL_XDA_P_READS")),
    V("  POOL_TEMP_XDA_P_READS", F("POOL_TEMP_XDA_P_READS")),
    V("  POOL_ASYNC_XDA_READS", F("POOL_ASYNC_XDA_READS")),
    V("  POOL_XDA_L_READS", F("POOL_XDA_L_READS")),
    V("  POOL_TEMP_XDA_L_READS", F("POOL_TEMP_XDA_L_READS")),
    Formula("( 1 - ( POOL_XDA_P_READS + POOL_TEMP_XDA_P_READS - POOL_ASYNC_XDA_READS ) / ( POOL_XDA_L_READS + POOL_TEMP_XDA_L_READS ) ) * 100"),
    HitRatio("COL hit ratio",
        AddSub("POOL_COL_P_READS", "POOL_TEMP_COL_P_READS", "POOL_ASYNC_COL_READS"),
        Add("POOL_COL_L_READS", "POOL_TEMP_COL_L_READS")),
    V("  POOL_COL_P_READS", F("POOL_COL_P_READS")),
    V("  POOL_TEMP_COL_P_READS", F("POOL_TEMP_COL_P_READS")),
    V("  POOL_ASYNC_COL_READS", F("POOL_ASYNC_COL_READS")),
    V("  POOL_COL_L_READS", F("POOL_COL_L_READS")),
    V("  POOL_TEMP_COL_L_READS", F("POOL_TEMP_COL_L_READS")),
    Formula("( 1 - ( POOL_COL_P_READS + POOL_TEMP_COL_P_READS - POOL_ASYNC_COL_READS ) / ( POOL_COL_L_READS + POOL_TEMP_COL_L_READS ) ) * 100"),
    Ratio("LBP Data hit ratio",
        Sub("POOL_DATA_LBP_PAGES_FOUND", "POOL_ASYNC_DATA_LBP_PAGES_FOUND"),
        Add("POOL_DATA_L_READS", "POOL_TEMP_DATA_L_READS"), Hundred),
    V("  POOL_DATA_LBP_PAGES_FOUND", F("POOL_DATA_LBP_PAGES_FOUND")),
    V("  POOL_ASYNC_DATA_LBP_PAGES_FOUND", F("POOL_ASYNC_DATA_LBP_PAGES_FOUND")),
    V("  POOL_DATA_L_READS", F("POOL_DATA_L_READS")),
    V("  POOL_TEMP_DATA_L_READS", F("POOL_TEMP_DATA_L_READS")),
    Formula("( POOL_DATA_LBP_PAGES_FOUND - POOL_ASYNC_DATA_LBP_PAGES_FOUND ) / ( POOL_DATA_L_READS + POOL_TEMP_DATA_L_READS ) * 100"),
    Ratio("LBP Index hit ratio",
        Sub("POOL_INDEX_LBP_PAGES_FOUND", "POOL_ASYNC_INDEX_LBP_PAGES_FOUND"),
        Add("POOL_INDEX_L_READS", "POOL_TEMP_INDEX_L_READS"), Hundred),
    V("  POOL_INDEX_LBP_PAGES_FOUND", F("POOL_INDEX_LBP_PAGES_FOUND")),
    V("  POOL_ASYNC_INDEX_LBP_PAGES_FOUND", F("POOL_ASYNC_INDEX_LBP_PAGES_FOUND")),
    V("  POOL_INDEX_L_READS", F("POOL_INDEX_L_READS")),
    V("  POOL_TEMP_INDEX_L_READS", F("POOL_TEMP_INDEX_L_READS")),
    Formula("( POOL_INDEX_LBP_PAGES_FOUND - POOL_ASYNC_INDEX_LBP_PAGES_FOUND ) / ( POOL_INDEX_L_READS + POOL_TEMP_INDEX_L_READS ) * 100"),
    Ratio("LBP XDA hit ratio",
        Sub("POOL_XDA_LBP_PAGES_FOUND", "POOL_ASYNC_XDA_LBP_PAGES_FOUND"),
        Add("POOL_XDA_L_READS", "POOL_TEMP_XDA_L_READS"), Hundred),
    V("  POOL_XDA_LBP_PAGES_FOUND", F("POOL_XDA_LBP_PAGES_FOUND")),
    V("  POOL_ASYNC_XDA_LBP_PAGES_FOUND", F("POOL_ASYNC_XDA_LBP_PAGES_FOUND")),
    V("  POOL_XDA_L_READS", F("POOL_XDA_L_READS")),
    V("  POOL_TEMP_XDA_L_READS", F("POOL_TEMP_XDA_L_READS")),
    Formula("( POOL_XDA_LBP_PAGES_FOUND - POOL_ASYNC_XDA_LBP_PAGES_FOUND ) / ( POOL_XDA_L_READS + POOL_TEMP_XDA_L_READS ) * 100"),
    Ratio("LBP COL hit ratio",
        Sub("POOL_COL_LBP_PAGES_FOUND", "POOL_ASYNC_COL_LBP_PAGES_FOUND"),
        Add("POOL_COL_L_READS", "POOL_TEMP_COL_L_READS"), Hundred),
    V("  POOL_COL_LBP_PAGES_FOUND", F("POOL_COL_LBP_PAGES_FOUND")),
    V("  POOL_ASYNC_COL_LBP_PAGES_FOUND", F("POOL_ASYNC_COL_LBP_PAGES_FOUND")),
    V("  POOL_COL_L_READS", F("POOL_COL_L_READS")),
    V("  POOL_TEMP_COL_L_READS", F("POOL_TEMP_COL_L_READS")),
    Formula("( POOL_COL_LBP_PAGES_FOUND - POOL_ASYNC_COL_LBP_PAGES_FOUND ) / ( POOL_COL_L_READS + POOL_TEMP_COL_L_READS ) * 100"),
    Ratio("GBP Data hit ratio",
        Sub("POOL_DATA_GBP_L_READS", "POOL_DATA_GBP_P_READS"), F("POOL_DATA_GBP_L_READS"), Hundred),
    V("  POOL_DATA_GBP_L_READS", F("POOL_DATA_GBP_L_READS")),
    V("  POOL_DATA_GBP_P_READS", F("POOL_DATA_GBP_P_READS")),
    Formula("( POOL_DATA_GBP_L_READS - POOL_DATA_GBP_P_READS ) / POOL_DATA_GBP_L_READS * 100"),
    Ratio("GBP Index hit ratio",
        Sub("POOL_INDEX_GBP_L_READS", "POOL_INDEX_GBP_P_READS"), F("POOL_INDEX_GBP_L_READS"), Hundred),
    V("  POOL_INDEX_GBP_L_READS", F("POOL_INDEX_GBP_L_READS")),
    V("  POOL_INDEX_GBP_P_READS", F("POOL_INDEX_GBP_P_READS")),
    Formula("( POOL_INDEX_GBP_L_READS - POOL_INDEX_GBP_P_READS ) / POOL_INDEX_GBP_L_READS * 100"),
    Ratio("GBP XDA hit ratio",
        Sub("POOL_XDA_GBP_L_READS", "POOL_XDA_GBP_P_READS"), F("POOL_XDA_GBP_L_READS"), Hundred),
    V("  POOL_XDA_GBP_L_READS", F("POOL_XDA_GBP_L_READS")),
    V("  POOL_XDA_GBP_P_READS", F("POOL_XDA_GBP_P_READS")),
    Formula("( POOL_XDA_GBP_L_READS - POOL_XDA_GBP_P_READS ) / POOL_XDA_GBP_L_READS * 100"),
    Ratio("GBP COL hit ratio",
        Sub("POOL_COL_GBP_L_READS", "POOL_COL_GBP_P_READS"), F("POOL_COL_GBP_L_READS"), Hundred),
    V("  POOL_COL_GBP_L_READS", F("POOL_COL_GBP_L_READS")),
    V("  POOL_COL_GBP_P_READS", F("POOL_COL_GBP_P_READS")),
    Formula("( POOL_COL_GBP_L_READS - POOL_COL_GBP_P_READS ) / POOL_COL_GBP_L_READS * 100"),
    BLANK,

    Heading("I/O"),
    DASHED,
    Heading("Buffer pool reads"),
    V("  POOL_DATA_L_READS", F("POOL_DATA_L_READS")),
    V("  POOL_TEMP_DATA_L_READS", F("POOL_TEMP_DATA_L_READS")),
    V("  POOL_DATA_P_READS", F("POOL_DATA_P_READS")),
    V("  POOL_TEMP_DATA_P_READS", F("POOL_TEMP_DATA_P_READS")),
    V("  POOL_ASYNC_DATA_READS", F("POOL_ASYNC_DATA_READS")),
    V("  POOL_INDEX_L_READS", F("POOL_INDEX_L_READS")),
    V("  POOL_TEMP_INDEX_L_READS", F("POOL_TEMP_INDEX_L_READS")),
    V("  POOL_INDEX_P_READS", F("POOL_INDEX_P_READS")),
    V("  POOL_TEMP_INDEX_P_READS", F("POOL_TEMP_INDEX_P_READS")),
    V("  POOL_ASYNC_INDEX_READS", F("POOL_ASYNC_INDEX_READS")),
    V("  POOL_XDA_L_READS", F("POOL_XDA_L_READS")),
    V("  POOL_TEMP_XDA_L_READS", F("POOL_TEMP_XDA_L_READS")),
    V("  POOL_XDA_P_READS", F("POOL_XDA_P_READS")),
    V("  POOL_TEMP_XDA_P_READS", F("POOL_TEMP_XDA_P_READS")),
    V("  POOL_ASYNC_XDA_READS", F("POOL_ASYNC_XDA_READS")),
    V("  POOL_COL_L_READS", F("POOL_COL_L_READS")),
    V("  POOL_TEMP_COL_L_READS", F("POOL_TEMP_COL_L_READS")),
    V("  POOL_COL_P_READS", F("POOL_COL_P_READS")),
    V("  POOL_TEMP_COL_P_READS", F("POOL_TEMP_COL_P_READS")),
    V("  POOL_ASYNC_COL_READS", F("POOL_ASYNC_COL_READS")),
    Heading("Buffer pool pages found"),
    V("  POOL_DATA_LBP_PAGES_FOUND", F("POOL_DATA_LBP_PAGES_FOUND")),
    V("  POOL_ASYNC_DATA_LBP_PAGES_FOUND", F("POOL_ASYNC_DATA_LBP_PAGES_FOUND")),
    V("  POOL_INDEX_LBP_PAGES_FOUND", F("POOL_INDEX_LBP_PAGES_FOUND")),
    V("  POOL_ASYNC_INDEX_LBP_PAGES_FOUND", F("POOL_ASYNC_INDEX_LBP_PAGES_FOUND")),
    V("  POOL_XDA_LBP_PAGES_FOUND", F("POOL_XDA_LBP_PAGES_FOUND")),
    V("  POOL_ASYNC_XDA_LBP_PAGES_FOUND", F("POOL_ASYNC_XDA_LBP_PAGES_FOUND")),
    V("  POOL_COL_LBP_PAGES_FOUND", F("POOL_COL_LBP_PAGES_FOUND")),
    V("  POOL_ASYNC_COL_LBP_PAGES_FOUND", F("POOL_ASYNC_COL_LBP_PAGES_FOUND")),
    Heading("Buffer pool writes"),
    V("  POOL_DATA_WRITES", F("POOL_DATA_WRITES")),
    V("  POOL_XDA_WRITES", F("POOL_XDA_WRITES")),
    V("  POOL_INDEX_WRITES", F("POOL_INDEX_WRITES")),
    V("  POOL_COL_WRITES", F("POOL_COL_WRITES")),
    Heading("Direct I/O"),
    V("  DIRECT_READS", F("DIRECT_READS")),
    V("  DIRECT_READ_REQS", F("DIRECT_READ_REQS")),
    V("  DIRECT_WRITES", F("DIRECT_WRITES")),
    V("  DIRECT_WRITE_REQS", F("DIRECT_WRITE_REQS")),
    Heading("Log I/O"),
    V("  LOG_DISK_WAITS_TOTAL", F("LOG_DISK_WAITS_TOTAL")),
    BLANK,

    Heading("Locking"),
    DASHED,
    V("LOCK_WAIT_TIME", F("LOCK_WAIT_TIME")),
    Ratio("  Per activity", F("LOCK_WAIT_TIME"), ACTS, Plain),
    V("LOCK_WAITS", F("LOCK_WAITS")),
    Ratio("  Per activity", F("LOCK_WAITS"), ACTS, Hundred),
    V("LOCK_TIMEOUTS", F("LOCK_TIMEOUTS")),
    Ratio("  Per activity", F("LOCK_TIMEOUTS"), ACTS, Hundred),
    V("DEADLOCKS", F("DEADLOCKS")),
    Ratio("  Per activity", F("DEADLOCKS"), ACTS, Hundred),
    V("LOCK_ESCALS", F("LOCK_ESCALS")),
    Ratio("  Per activity", F("LOCK_ESCALS"), ACTS, Hundred),
    BLANK,

    Heading("Routines"),
    DASHED,
    V("TOTAL_ROUTINE_INVOCATIONS", F("TOTAL_ROUTINE_INVOCATIONS")),
    Ratio("  Per activity", F("TOTAL_ROUTINE_INVOCATIONS"), ACTS, Plain),
    V("TOTAL_ROUTINE_TIME", F("TOTAL_ROUTINE_TIME")),
    Ratio("  Per activity", F("TOTAL_ROUTINE_TIME"), ACTS, Plain),
    BLANK,
    Ratio("TOTAL_ROUTINE_TIME per invocation", F("TOTAL_ROUTINE_TIME"), F("TOTAL_ROUTINE_INVOCATIONS"), Plain),
    BLANK,

    Heading("Sort"),
    DASHED,
    V("TOTAL_SORTS", F("TOTAL_SORTS")),
    V("SORT_OVERFLOWS", F("SORT_OVERFLOWS")),
    V("POST_THRESHOLD_SORTS", F("POST_THRESHOLD_SORTS")),
    V("POST_SHRTHRESHOLD_SORTS", F("POST_SHRTHRESHOLD_SORTS")),
    BLANK,

    Heading("Network"),
    DASHED,
    Heading("Communications with remote clients"),
    Ratio("TCPIP_SEND_VOLUME per send", F("TCPIP_SEND_VOLUME"), F("TCPIP_SENDS_TOTAL"), Plain),
    V("  TCPIP_SEND_VOLUME", F("TCPIP_SEND_VOLUME")),
    V("  TCPIP_SENDS_TOTAL", F("TCPIP_SENDS_TOTAL")),
    Ratio("TCPIP_RECV_VOLUME per receive", F("TCPIP_RECV_VOLUME"), F("TCPIP_RECVS_TOTAL"), Plain),
    V("  TCPIP_RECV_VOLUME", F("TCPIP_RECV_VOLUME")),
    V("  TCPIP_RECVS_TOTAL", F("TCPIP_RECVS_TOTAL")),
    BLANK,
    Heading("Communications with local clients"),
    Ratio("IPC_SEND_VOLUME per send", F("IPC_SEND_VOLUME"), F("IPC_SENDS_TOTAL"), Plain),
    V("  IPC_SEND_VOLUME", F("IPC_SEND_VOLUME")),
    V("  IPC_SENDS_TOTAL", F("IPC_SENDS_TOTAL")),
    Ratio("IPC_RECV_VOLUME per receive", F("IPC_RECV_VOLUME"), F("IPC_RECVS_TOTAL"), Plain),
    V("  IPC_RECV_VOLUME", F("IPC_RECV_VOLUME")),
    V("  IPC_RECVS_TOTAL", F("IPC_RECVS_TOTAL")),
    BLANK,
    Heading("Fast communications manager"),
    Ratio("FCM_SEND_VOLUME per send", F("FCM_SEND_VOLUME"), F("FCM_SENDS_TOTAL"), Plain),
    V("  FCM_SEND_VOLUME", F("FCM_SEND_VOLUME")),
    V("  FCM_SENDS_TOTAL", F("FCM_SENDS_TOTAL")),
    Ratio("FCM_RECV_VOLUME per receive", F("FCM_RECV_VOLUME"), F("FCM_RECVS_TOTAL"), Plain),
    V("  FCM_RECV_VOLUME", F("FCM_RECV_VOLUME")),
    V("  FCM_RECVS_TOTAL", F("FCM_RECVS_TOTAL")),
    BLANK,

    Heading("Other"),
    DASHED,
    Heading("Compilation"),
    V("  TOTAL_COMPILATIONS", F("TOTAL_COMPILATIONS")),
    V("  PKG_CACHE_INSERTS", F("PKG_CACHE_INSERTS")),
    V("  PKG_CACHE_LOOKUPS", F("PKG_CACHE_LOOKUPS")),
    Heading("Catalog cache"),
    V("  CAT_CACHE_INSERTS", F("CAT_CACHE_INSERTS")),
    V("  CAT_CACHE_LOOKUPS", F("CAT_CACHE_LOOKUPS")),
    Heading("Transaction processing"),
    V("  TOTAL_APP_COMMITS", F("TOTAL_APP_COMMITS")),
    V("  INT_COMMITS", F("INT_COMMITS")),
    V("  TOTAL_APP_ROLLBACKS", F("TOTAL_APP_ROLLBACKS")),
    V("  INT_ROLLBACKS", F("INT_ROLLBACKS")),
    Heading("Log buffer"),
    V("  NUM_LOG_BUFFER_FULL", F("NUM_LOG_BUFFER_FULL")),
    Heading("Activities aborted/rejected"),
    V("  ACT_ABORTED_TOTAL", F("ACT_ABORTED_TOTAL")),
    V("  ACT_REJECTED_TOTAL", F("ACT_REJECTED_TOTAL")),
    Heading("Workload management controls"),
    V("  WLM_QUEUE_ASSIGNMENTS_TOTAL", F("WLM_QUEUE_ASSIGNMENTS_TOTAL")),
    V("  WLM_QUEUE_TIME_TOTAL", F("WLM_QUEUE_TIME_TOTAL")),
    BLANK,

    Heading("DB2 utility operations"),
    DASHED,
    V("  TOTAL_RUNSTATS", F("TOTAL_RUNSTATS")),
    V("  TOTAL_REORGS", F("TOTAL_REORGS")),
    V("  TOTAL_LOADS", F("TOTAL_LOADS")),
    BLANK,
];

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

impl Expr {
    fn fields(self) -> Vec<&'static str> {
        match self {
            F(a) => vec![a],
            Add(a, b) | Sub(a, b) => vec![a, b],
            AddSub(a, b, c) => vec![a, b, c],
            Elapsed => Vec::new(),
        }
    }

    /// Value of the expression for every interval of `frame`.
    pub(crate) fn eval(self, diff: &Differenced, frame: &DifferencedFrame) -> Result<Vec<f64>> {
        let col = |name: &str| -> Result<Vec<f64>> { Ok(frame.column(diff.position(name)?)) };
        Ok(match self {
            F(a) => col(a)?,
            Add(a, b) => zip_with(&col(a)?, &col(b)?, |x, y| x + y),
            Sub(a, b) => zip_with(&col(a)?, &col(b)?, |x, y| x - y),
            AddSub(a, b, c) => {
                let ab = zip_with(&col(a)?, &col(b)?, |x, y| x + y);
                zip_with(&ab, &col(c)?, |x, y| x - y)
            }
            Elapsed => frame.elapsed(),
        })
    }
}

fn zip_with(a: &[f64], b: &[f64], f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect()
}

/// Every counter the section reads, sorted.
pub fn required_fields() -> BTreeSet<&'static str> {
    LINES
        .iter()
        .flat_map(|line| match *line {
            V(_, e) => e.fields(),
            Ratio(_, n, d, _) | HitRatio(_, n, d) => {
                let mut f = n.fields();
                f.extend(d.fields());
                f
            }
            Heading(_) | Sep(_) | Formula(_) => Vec::new(),
        })
        .collect()
}

/// Look up every counter the section reads, plus `extra`.
///
/// Reports call this before their header so a missing column fails without
/// leaving a half-printed report.
pub(crate) fn check_fields(diff: &Differenced, extra: &[&str]) -> Result<()> {
    for name in required_fields() {
        diff.position(name)?;
    }
    for name in extra {
        diff.position(name)?;
    }
    Ok(())
}

/// Render the request metrics of one context.
pub(crate) fn render<W: Write, S: BlobSource>(
    r: &mut Renderer<W, S>,
    diff: &Differenced,
    frame: &DifferencedFrame,
) -> Result<()> {
    check_fields(diff, &[])?;

    for line in LINES {
        match *line {
            Heading(text) => r.line(text)?,
            Sep(sep) => r.separator(sep)?,
            Formula(text) => r.formula(text)?,
            V(label, e) => r.series(label, &e.eval(diff, frame)?)?,
            Ratio(label, num, den, scale) => {
                let factor = match scale {
                    Plain => 1.0,
                    Percent | Hundred => 100.0,
                };
                let values = zip_with(&num.eval(diff, frame)?, &den.eval(diff, frame)?, |n, d| {
                    factor * (n / d)
                });
                match scale {
                    Percent => r.percent_series(label, &values)?,
                    Plain | Hundred => r.series(label, &values)?,
                }
            }
            HitRatio(label, misses, reads) => {
                let values = zip_with(
                    &misses.eval(diff, frame)?,
                    &reads.eval(diff, frame)?,
                    |m, t| (1.0 - m / t) * 100.0,
                );
                r.series(label, &values)?;
            }
        }
    }
    Ok(())
}
