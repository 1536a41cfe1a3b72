use colored::*;
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

use crate::cli::cli_args::OutputFormat;
use crate::engine::{AccessPathComparison, ExecutionPlan, ScanType};
use crate::utils::types::{Document, ExecutionStats, IndexDescriptor, SortDirection};

/// Formats query results and plans for CLI output
pub struct OutputFormatter;

impl OutputFormatter {
    /// Format documents according to the specified format
    pub fn format_documents(documents: &[Document], format: &OutputFormat) -> String {
        match format {
            OutputFormat::Table => Self::format_table(documents),
            OutputFormat::Json => Self::format_json(documents),
            OutputFormat::Csv => Self::format_csv(documents),
        }
    }

    /// Column set for a batch of documents: sorted union of keys
    fn column_names(documents: &[Document]) -> Vec<String> {
        let mut columns: BTreeSet<String> = BTreeSet::new();
        for document in documents {
            for key in document.keys() {
                columns.insert(key.clone());
            }
        }
        columns.into_iter().collect()
    }

    /// Format documents as a colored table
    fn format_table(documents: &[Document]) -> String {
        if documents.is_empty() {
            return "No documents found.".dimmed().to_string();
        }

        let columns = Self::column_names(documents);
        let mut col_widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();

        for document in documents {
            for (i, column) in columns.iter().enumerate() {
                let value = document.get(column).unwrap_or(&JsonValue::Null);
                col_widths[i] = col_widths[i].max(Self::value_to_string(value).len());
            }
        }
        for width in &mut col_widths {
            *width = (*width).max(8);
        }

        let mut output = String::new();
        output.push_str(&Self::table_separator(&col_widths));
        output.push('|');
        for (i, column) in columns.iter().enumerate() {
            output.push_str(&format!(
                " {:<width$} |",
                column.bold().cyan(),
                width = col_widths[i]
            ));
        }
        output.push('\n');
        output.push_str(&Self::table_separator(&col_widths));

        for document in documents {
            output.push('|');
            for (i, column) in columns.iter().enumerate() {
                let value = document.get(column).unwrap_or(&JsonValue::Null);
                output.push_str(&format!(
                    " {:<width$} |",
                    Self::format_value_colored(value),
                    width = col_widths[i]
                ));
            }
            output.push('\n');
        }

        output.push_str(&Self::table_separator(&col_widths));
        output
    }

    fn table_separator(col_widths: &[usize]) -> String {
        let mut separator = String::from("+");
        for &width in col_widths {
            separator.push_str(&"-".repeat(width + 2));
            separator.push('+');
        }
        separator.push('\n');
        separator
    }

    /// Format documents as pretty-printed JSON
    fn format_json(documents: &[Document]) -> String {
        serde_json::to_string_pretty(documents)
            .unwrap_or_else(|_| "[]".to_string())
    }

    /// Format documents as CSV with a header row
    fn format_csv(documents: &[Document]) -> String {
        if documents.is_empty() {
            return String::new();
        }

        let columns = Self::column_names(documents);
        let mut output = String::new();

        let header: Vec<String> = columns.iter().map(|c| Self::csv_escape(c)).collect();
        output.push_str(&header.join(","));
        output.push('\n');

        for document in documents {
            let row: Vec<String> = columns
                .iter()
                .map(|column| {
                    let value = document.get(column).unwrap_or(&JsonValue::Null);
                    Self::csv_escape(&Self::value_to_string(value))
                })
                .collect();
            output.push_str(&row.join(","));
            output.push('\n');
        }

        output
    }

    fn csv_escape(value: &str) -> String {
        if value.contains(',') || value.contains('"') || value.contains('\n') {
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }

    /// Render a JSON value for plain display
    pub fn value_to_string(value: &JsonValue) -> String {
        match value {
            JsonValue::Null => "null".to_string(),
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn format_value_colored(value: &JsonValue) -> ColoredString {
        match value {
            JsonValue::Null => "null".dimmed(),
            JsonValue::Bool(b) => b.to_string().blue(),
            JsonValue::Number(n) => n.to_string().yellow(),
            JsonValue::String(s) => s.clone().normal(),
            other => other.to_string().normal(),
        }
    }

    /// Format a chosen execution plan
    pub fn format_plan(plan: &ExecutionPlan) -> String {
        let mut output = String::new();

        let scan = match plan.scan_type {
            ScanType::FullScan => plan.scan_type.as_str().yellow().bold(),
            ScanType::IndexScan => plan.scan_type.as_str().green().bold(),
        };
        output.push_str(&format!("Plan: {}\n", scan));

        match &plan.chosen_index {
            Some(index) => {
                output.push_str(&format!("  Index: {}\n", Self::index_key_display(index).cyan()));
            }
            None => output.push_str(&format!("  Index: {}\n", "none".dimmed())),
        }

        output.push_str(&format!(
            "  Estimated documents examined: {}\n",
            plan.estimated_docs_examined.to_string().yellow()
        ));
        output.push_str(&format!(
            "  Satisfies sort order: {}\n",
            if plan.satisfies_sort { "yes".green() } else { "no (in-memory sort)".yellow() }
        ));

        output
    }

    /// Format observed execution statistics
    pub fn format_stats(stats: &ExecutionStats) -> String {
        format!(
            "{} documents examined in {:.2}ms",
            stats.docs_examined.to_string().green().bold(),
            stats.elapsed_millis
        )
    }

    /// Format an index-versus-scan comparison
    pub fn format_comparison(comparison: &AccessPathComparison) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}\n", "Without index (collection scan):".bold()));
        output.push_str(&format!(
            "  Documents examined: {}\n",
            comparison.collection_scan.docs_examined.to_string().yellow()
        ));
        output.push_str(&format!(
            "  Execution time: {:.2}ms\n",
            comparison.collection_scan.elapsed_millis
        ));

        match (&comparison.index_scan, &comparison.index_name) {
            (Some(stats), Some(name)) => {
                output.push_str(&format!("{}\n", format!("With index {}:", name).bold()));
                output.push_str(&format!(
                    "  Documents examined: {}\n",
                    stats.docs_examined.to_string().green()
                ));
                output.push_str(&format!("  Execution time: {:.2}ms\n", stats.elapsed_millis));
            }
            _ => {
                output.push_str(&"No index available for this query.\n".dimmed().to_string());
            }
        }

        output
    }

    /// Format an index catalog listing
    pub fn format_indexes(indexes: &[IndexDescriptor]) -> String {
        if indexes.is_empty() {
            return "No indexes defined.".dimmed().to_string();
        }

        let mut output = String::new();
        for (i, index) in indexes.iter().enumerate() {
            let unique = if index.unique { " [unique]".yellow().to_string() } else { String::new() };
            output.push_str(&format!(
                "  {}. {} {}{}\n",
                i + 1,
                index.name.cyan().bold(),
                Self::index_key_display(index),
                unique
            ));
        }
        output
    }

    fn index_key_display(index: &IndexDescriptor) -> String {
        let keys: Vec<String> = index
            .fields
            .iter()
            .map(|f| {
                let dir = match f.direction {
                    SortDirection::Ascending => 1,
                    SortDirection::Descending => -1,
                };
                format!("\"{}\": {}", f.field, dir)
            })
            .collect();
        format!("{{{}}}", keys.join(", "))
    }

    /// Format an informational message
    pub fn format_info(message: &str) -> String {
        format!("{} {}", "info:".blue().bold(), message)
    }

    /// Format an error message
    pub fn format_error(message: &str) -> String {
        format!("{} {}", "error:".red().bold(), message)
    }

    /// Format a success message
    pub fn format_success(message: &str) -> String {
        format!("{} {}", "ok:".green().bold(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::types::IndexField;
    use serde_json::json;

    fn docs() -> Vec<Document> {
        vec![
            match json!({"title": "1984", "price": 10.99}) {
                JsonValue::Object(map) => map,
                _ => unreachable!(),
            },
            match json!({"title": "Animal Farm", "price": 8.50, "in_stock": false}) {
                JsonValue::Object(map) => map,
                _ => unreachable!(),
            },
        ]
    }

    #[test]
    fn test_column_names_are_union_of_keys() {
        let columns = OutputFormatter::column_names(&docs());
        assert_eq!(columns, vec!["in_stock", "price", "title"]);
    }

    #[test]
    fn test_format_table_contains_values() {
        let output = OutputFormatter::format_documents(&docs(), &OutputFormat::Table);
        assert!(output.contains("1984"));
        assert!(output.contains("Animal Farm"));
        assert!(output.contains("title"));
    }

    #[test]
    fn test_format_table_empty() {
        let output = OutputFormatter::format_documents(&[], &OutputFormat::Table);
        assert!(output.contains("No documents found."));
    }

    #[test]
    fn test_format_json_round_trips() {
        let output = OutputFormatter::format_documents(&docs(), &OutputFormat::Json);
        let parsed: Vec<Document> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].get("title"), Some(&json!("1984")));
    }

    #[test]
    fn test_format_csv_header_and_rows() {
        let output = OutputFormatter::format_documents(&docs(), &OutputFormat::Csv);
        let mut lines = output.lines();
        assert_eq!(lines.next(), Some("in_stock,price,title"));
        assert_eq!(lines.next(), Some("null,10.99,1984"));
        assert_eq!(lines.next(), Some("false,8.5,Animal Farm"));
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(OutputFormatter::csv_escape("plain"), "plain");
        assert_eq!(OutputFormatter::csv_escape("a,b"), "\"a,b\"");
        assert_eq!(OutputFormatter::csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_format_plan_full_scan() {
        let plan = ExecutionPlan::full_scan(12, true);
        let output = OutputFormatter::format_plan(&plan);
        assert!(output.contains("FULL_SCAN"));
        assert!(output.contains("12"));
        assert!(output.contains("in-memory sort"));
    }

    #[test]
    fn test_format_indexes() {
        let indexes = vec![IndexDescriptor::new(vec![
            IndexField::ascending("author"),
            IndexField::ascending("published_year"),
        ])];
        let output = OutputFormatter::format_indexes(&indexes);
        assert!(output.contains("author_1_published_year_1"));
        assert!(output.contains("\"author\": 1"));
    }
}
