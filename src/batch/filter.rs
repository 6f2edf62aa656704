//! Unknowns filtering
//!
//! Removes known-noise diagnostics from a scan result and turns the
//! survivors into report rows ordered by file path.

use std::collections::HashMap;

use super::scanner::FileCoordinate;

/// Diagnostics that are expected and carry no signal
pub const DEFAULT_DENY_LIST: &[&str] = &["unable to determine ELF features"];

/// Separator between a cataloger task name and its message
pub const TASK_SEPARATOR: &str = ": ";

/// One surviving diagnostic, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub coordinate: FileCoordinate,
    pub task: Option<String>,
    pub message: String,
    raw: String,
}

impl ReportRow {
    pub fn new(coordinate: FileCoordinate, raw: &str) -> Self {
        let (task, message) = split_task(raw);
        Self {
            coordinate,
            task,
            message,
            raw: raw.to_string(),
        }
    }

    /// The diagnostic exactly as the scanner emitted it
    pub fn raw_message(&self) -> &str {
        &self.raw
    }
}

/// Split `"<task>: <message>"` on the first separator
pub fn split_task(raw: &str) -> (Option<String>, String) {
    match raw.split_once(TASK_SEPARATOR) {
        Some((task, message)) if !task.is_empty() => (Some(task.to_string()), message.to_string()),
        Some((_, message)) => (None, message.to_string()),
        None => (None, raw.to_string()),
    }
}

/// Substring deny-list applied to raw diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorFilter {
    deny: Vec<String>,
}

impl Default for ErrorFilter {
    fn default() -> Self {
        Self {
            deny: DEFAULT_DENY_LIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ErrorFilter {
    /// Default deny-list extended with `extra` entries
    pub fn new(extra: impl IntoIterator<Item = String>) -> Self {
        let mut filter = Self::default();
        for entry in extra {
            if !entry.is_empty() && !filter.deny.contains(&entry) {
                filter.deny.push(entry);
            }
        }
        filter
    }

    pub fn deny_list(&self) -> &[String] {
        &self.deny
    }

    pub fn is_noise(&self, message: &str) -> bool {
        self.deny.iter().any(|pattern| message.contains(pattern.as_str()))
    }

    /// Drop noise, preserving the order of what remains
    pub fn filter_errors(&self, errors: &[String]) -> Vec<String> {
        errors
            .iter()
            .filter(|message| !self.is_noise(message))
            .cloned()
            .collect()
    }

    /// Filter every coordinate, removing coordinates left without errors
    pub fn filter_unknowns(
        &self,
        unknowns: HashMap<FileCoordinate, Vec<String>>,
    ) -> HashMap<FileCoordinate, Vec<String>> {
        unknowns
            .into_iter()
            .filter_map(|(coordinate, errors)| {
                let errors = self.filter_errors(&errors);
                (!errors.is_empty()).then_some((coordinate, errors))
            })
            .collect()
    }

    /// Filtered rows sorted by real path, then original error order
    pub fn report_rows(&self, unknowns: HashMap<FileCoordinate, Vec<String>>) -> Vec<ReportRow> {
        let mut entries: Vec<_> = self.filter_unknowns(unknowns).into_iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        entries
            .into_iter()
            .flat_map(|(coordinate, errors)| {
                errors
                    .into_iter()
                    .map(move |raw| ReportRow::new(coordinate.clone(), &raw))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_task() {
        assert_eq!(
            split_task("go-binary-cataloger: unable to parse symbols"),
            (Some("go-binary-cataloger".to_string()), "unable to parse symbols".to_string())
        );
        assert_eq!(split_task("a: b: c"), (Some("a".to_string()), "b: c".to_string()));
        assert_eq!(split_task("no separator here"), (None, "no separator here".to_string()));
        assert_eq!(split_task("path:with:colons"), (None, "path:with:colons".to_string()));
        assert_eq!(split_task(": orphan"), (None, "orphan".to_string()));
    }

    #[test]
    fn test_deny_listed_message_dropped() {
        let filter = ErrorFilter::default();
        let out = filter.filter_errors(&errs(&[
            "unable to determine ELF features: bad magic",
            "go-binary-cataloger: unable to parse symbols",
        ]));
        assert_eq!(out, errs(&["go-binary-cataloger: unable to parse symbols"]));
    }

    #[test]
    fn test_extra_deny_entries() {
        let filter = ErrorFilter::new(vec!["archive not expanded".to_string(), String::new()]);
        assert_eq!(filter.deny_list().len(), 2);
        assert!(filter.is_noise("java: archive not expanded"));
        assert!(filter.is_noise("unable to determine ELF features"));
        assert!(!filter.is_noise("unknown binary"));
    }

    #[test]
    fn test_empty_coordinates_removed() {
        let filter = ErrorFilter::default();
        let mut unknowns = HashMap::new();
        unknowns.insert(
            FileCoordinate::new("/bin/noisy"),
            errs(&["unable to determine ELF features: truncated"]),
        );
        unknowns.insert(FileCoordinate::new("/bin/real"), errs(&["elf: unknown binary"]));

        let filtered = filter.filter_unknowns(unknowns);
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key(&FileCoordinate::new("/bin/real")));
    }

    #[test]
    fn test_rows_sorted_by_path_then_error_order() {
        let filter = ErrorFilter::default();
        let mut unknowns = HashMap::new();
        unknowns.insert(FileCoordinate::new("/usr/lib/b.so"), errs(&["t: second", "t: third"]));
        unknowns.insert(FileCoordinate::new("/usr/bin/a"), errs(&["first"]));
        unknowns.insert(FileCoordinate::new("/opt/gone"), errs(&["unable to determine ELF features"]));

        let rows = filter.report_rows(unknowns);
        let flat: Vec<_> = rows
            .iter()
            .map(|r| (r.coordinate.real_path.as_str(), r.task.as_deref(), r.message.as_str()))
            .collect();
        assert_eq!(
            flat,
            vec![
                ("/usr/bin/a", None, "first"),
                ("/usr/lib/b.so", Some("t"), "second"),
                ("/usr/lib/b.so", Some("t"), "third"),
            ]
        );
    }

    #[test]
    fn test_raw_message_preserved() {
        let row = ReportRow::new(FileCoordinate::new("/x"), "go-binary-cataloger: unable to parse symbols");
        assert_eq!(row.raw_message(), "go-binary-cataloger: unable to parse symbols");

        let row = ReportRow::new(FileCoordinate::new("/x"), "plain");
        assert_eq!(row.raw_message(), "plain");

        // Leading separator: no task, but the raw text is kept intact
        let row = ReportRow::new(FileCoordinate::new("/x"), ": orphan");
        assert_eq!(row.task, None);
        assert_eq!(row.message, "orphan");
        assert_eq!(row.raw_message(), ": orphan");

        let row = ReportRow::new(FileCoordinate::new("/x"), ": ");
        assert_eq!(row.task, None);
        assert_eq!(row.message, "");
        assert_eq!(row.raw_message(), ": ");
    }
}
