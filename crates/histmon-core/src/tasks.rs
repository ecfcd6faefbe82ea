//! Collection task details written alongside the snapshots.
//!
//! Every hourly directory carries a copy of the task list the collector ran,
//! `task_details_copy.json`. The tabulator reads it to find the summary columns
//! of a collection.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ReportError, Result};

pub const TASK_DETAILS_FILE: &str = "task_details_copy.json";

/// One collection task as recorded by the collector.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskDetail {
    pub collection_name: String,
    /// `SQL` for table-function collections, `SYS` for command output.
    pub collection_class: String,
    /// Comma-separated column names shown in summary display.
    #[serde(default)]
    pub quickparse_summary_columns: String,
}

impl TaskDetail {
    pub fn is_sql(&self) -> bool {
        self.collection_class.eq_ignore_ascii_case("SQL")
    }

    /// Summary column names, trimmed, empty entries dropped.
    pub fn summary_columns(&self) -> Vec<String> {
        self.quickparse_summary_columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Read the task list from `dir/task_details_copy.json`.
pub fn read_task_details(dir: &Path) -> Result<Vec<TaskDetail>> {
    let path = dir.join(TASK_DETAILS_FILE);
    let text = fs::read_to_string(&path).map_err(|e| ReportError::file(&path, e))?;
    Ok(serde_json::from_str(&text)?)
}

/// The last task named `group`, as the collector lets later entries override
/// earlier ones.
pub fn find_task<'a>(tasks: &'a [TaskDetail], group: &str) -> Option<&'a TaskDetail> {
    tasks.iter().rev().find(|t| t.collection_name == group)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"collection_name": "ENV_GET_SYSTEM_RESOURCES", "collection_class": "SQL",
         "collection_command": "SELECT * FROM TABLE(SYSPROC.ENV_GET_SYSTEM_RESOURCES())",
         "quickparse_summary_columns": "MEMBER, CPU_USAGE_TOTAL"},
        {"collection_name": "VMSTAT", "collection_class": "SYS",
         "quickparse_summary_columns": ""}
    ]"#;

    #[test]
    fn test_parse_task_details() {
        let tasks: Vec<TaskDetail> = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(tasks.len(), 2);
        let env = find_task(&tasks, "ENV_GET_SYSTEM_RESOURCES").unwrap();
        assert!(env.is_sql());
        assert_eq!(env.summary_columns(), vec!["MEMBER", "CPU_USAGE_TOTAL"]);
        assert!(!find_task(&tasks, "VMSTAT").unwrap().is_sql());
        assert!(find_task(&tasks, "MON_GET_TABLE").is_none());
    }

    #[test]
    fn test_read_task_details_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_task_details(dir.path()).unwrap_err();
        assert!(matches!(err, ReportError::File { .. }));
    }

    #[test]
    fn test_read_task_details_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(TASK_DETAILS_FILE), SAMPLE).unwrap();
        let tasks = read_task_details(dir.path()).unwrap();
        assert_eq!(tasks[1].collection_name, "VMSTAT");
    }
}
