//! Row parser — converts a raw header row + data row into an application
//! entry.
//!
//! Pure and total: missing cells read as empty strings, unknown columns
//! become question/answer pairs. Column identity is matched by
//! case-insensitive substring, not position, so form edits that reorder
//! columns keep working.

/// Structured view of one form response row.
///
/// Derived, never stored: the poller and the decision engine each re-derive
/// it from the current row contents, so two entries for the "same" row can
/// differ if the sheet was edited in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationEntry {
    /// (question label, answer) pairs in column order. Empty answers are
    /// kept here and filtered at render time.
    pub questions: Vec<(String, String)>,
    /// Trimmed value of the first column whose name contains "discord".
    pub applicant_handle: Option<String>,
    /// Application-type label; the caller's default unless a non-empty
    /// "application type" column overrides it.
    pub type_label: String,
}

/// Parse one data row against its header row.
///
/// `default_label` comes from the source descriptor and is overridden only
/// by a non-empty "application type" cell.
pub fn parse_row(header: &[String], row: &[String], default_label: &str) -> ApplicationEntry {
    let mut questions = Vec::new();
    let mut applicant_handle = None;
    let mut type_label = default_label.to_string();

    for (col, name) in header.iter().enumerate() {
        let value = row.get(col).map(String::as_str).unwrap_or("");
        let lower = name.to_lowercase();

        if lower.contains("discord") {
            applicant_handle = Some(value.trim().to_string());
        } else if lower.contains("application type") {
            if !value.is_empty() {
                type_label = value.to_string();
            }
        } else {
            questions.push((name.clone(), value.to_string()));
        }
    }

    ApplicationEntry {
        questions,
        applicant_handle,
        type_label,
    }
}

/// A row is blank when every cell is empty or whitespace. Blank rows are
/// skipped by the poller, not published.
pub fn is_blank_row(row: &[String]) -> bool {
    !row.iter().any(|cell| !cell.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn routes_fields_by_header_name() {
        let header = cells(&[
            "Discord Username",
            "Application Type",
            "Why do you want to join?",
        ]);
        let row = cells(&["alice#0001", "Beta", "because"]);

        let entry = parse_row(&header, &row, "Application");
        assert_eq!(entry.applicant_handle.as_deref(), Some("alice#0001"));
        assert_eq!(entry.type_label, "Beta");
        assert_eq!(
            entry.questions,
            vec![("Why do you want to join?".to_string(), "because".to_string())]
        );
    }

    #[test]
    fn header_match_is_case_insensitive_substring() {
        let header = cells(&["Your DISCORD tag", "Preferred APPLICATION TYPE here"]);
        let row = cells(&["  bob#1234  ", "Team"]);

        let entry = parse_row(&header, &row, "Application");
        assert_eq!(entry.applicant_handle.as_deref(), Some("bob#1234"));
        assert_eq!(entry.type_label, "Team");
        assert!(entry.questions.is_empty());
    }

    #[test]
    fn empty_type_cell_keeps_caller_default() {
        let header = cells(&["Application Type", "Q1"]);
        let row = cells(&["", "answer"]);

        let entry = parse_row(&header, &row, "Moderator");
        assert_eq!(entry.type_label, "Moderator");
    }

    #[test]
    fn missing_cells_read_as_empty_and_are_kept() {
        let header = cells(&["Q1", "Q2", "Q3"]);
        let row = cells(&["only one"]);

        let entry = parse_row(&header, &row, "Application");
        // Empty answers survive parsing; rendering filters them.
        assert_eq!(
            entry.questions,
            vec![
                ("Q1".to_string(), "only one".to_string()),
                ("Q2".to_string(), String::new()),
                ("Q3".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn row_longer_than_header_ignores_extra_cells() {
        let header = cells(&["Q1"]);
        let row = cells(&["a", "extra"]);

        let entry = parse_row(&header, &row, "Application");
        assert_eq!(entry.questions, vec![("Q1".to_string(), "a".to_string())]);
    }

    #[test]
    fn blank_row_detection() {
        assert!(is_blank_row(&cells(&["", "  ", "\t"])));
        assert!(is_blank_row(&[]));
        assert!(!is_blank_row(&cells(&["", "x"])));
    }
}
