//! Presentation of demo results.
//!
//! The facade returns data only; this module turns a [`DemoReport`] into the
//! console text of the demo or into NDJSON (one object per section).

use bson::Bson;
use serde::Serialize;
use std::fmt::Write as _;

use crate::book::{Book, PartialBook};
use crate::errors::Result;
use crate::query::{Bucket, GroupAverage, GroupCount, IndexDescriptor, SortSpec};

pub const BANNER: &str = "BOOKSTORE - DOCUMENT STORE QUERIES";
const RULE: &str = "====================================";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    BasicCrud,
    AdvancedQueries,
    Aggregation,
    Indexing,
}

impl Task {
    #[must_use]
    pub fn heading(self) -> &'static str {
        match self {
            Self::BasicCrud => "TASK 2: BASIC CRUD OPERATIONS",
            Self::AdvancedQueries => "TASK 3: ADVANCED QUERIES",
            Self::Aggregation => "TASK 4: AGGREGATION PIPELINE",
            Self::Indexing => "TASK 5: INDEXING",
        }
    }
}

/// How a list of books is printed, one line per book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    /// `- Dune by Frank Herbert`
    ByAuthor,
    /// `- Dune (1965)`
    Year,
    /// `- Dune (1965) - $14.99`
    YearAndPrice,
    /// `- Dune: $14.99`
    Price,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Books { heading: String, style: LineStyle, books: Vec<Book> },
    Projected { books: Vec<PartialBook> },
    Updated { title: String, modified: u64, after: Option<Book> },
    Deleted { title: String, deleted: u64 },
    Averages { by: String, rows: Vec<GroupAverage> },
    Top { by: String, row: Option<GroupCount> },
    Buckets { rows: Vec<Bucket> },
    IndexesCreated { names: Vec<String> },
    Indexes { indexes: Vec<IndexDescriptor> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub task: Task,
    pub title: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DemoReport {
    pub sections: Vec<Section>,
}

impl DemoReport {
    pub fn push(&mut self, task: Task, title: impl Into<String>, outcome: Outcome) {
        self.sections.push(Section { task, title: title.into(), outcome });
    }

    #[must_use]
    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title == title)
    }
}

fn money(v: f64) -> String {
    format!("${v:.2}")
}

/// Group keys print bare when they are strings.
#[must_use]
pub fn group_label(v: &Bson) -> String {
    match v {
        Bson::String(s) => s.clone(),
        Bson::Null => "(none)".to_string(),
        other => other.to_string(),
    }
}

/// `{"author": 1, "published_year": 1}`
#[must_use]
pub fn index_keys_label(keys: &[SortSpec]) -> String {
    let parts: Vec<String> =
        keys.iter().map(|k| format!("\"{}\": {}", k.field, k.order.direction())).collect();
    format!("{{{}}}", parts.join(", "))
}

fn book_line(b: &Book, style: LineStyle) -> String {
    match style {
        LineStyle::ByAuthor => format!("- {} by {}", b.title, b.author),
        LineStyle::Year => format!("- {} ({})", b.title, b.published_year),
        LineStyle::YearAndPrice => {
            format!("- {} ({}) - {}", b.title, b.published_year, money(b.price))
        }
        LineStyle::Price => format!("- {}: {}", b.title, money(b.price)),
    }
}

fn opt_or_dash<T: ToString>(v: Option<&T>) -> String {
    v.map_or_else(|| "-".to_string(), ToString::to_string)
}

/// Text for one section, without a trailing newline.
#[must_use]
pub fn render_section(section: &Section) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", section.title);
    match &section.outcome {
        Outcome::Books { heading, style, books } => {
            let _ = write!(out, "{heading}");
            for b in books {
                let _ = write!(out, "\n{}", book_line(b, *style));
            }
        }
        Outcome::Projected { books } => {
            let _ = write!(out, "Books with limited fields:");
            for b in books {
                let price = b.price.map_or_else(|| "-".to_string(), money);
                let _ = write!(
                    out,
                    "\n- {} | {} | {price}",
                    opt_or_dash(b.title.as_ref()),
                    opt_or_dash(b.author.as_ref())
                );
            }
        }
        Outcome::Updated { modified, after, .. } => {
            let _ = write!(out, "Modified {modified} document(s)");
            match after {
                Some(b) => {
                    let _ = write!(out, "\nUpdated book: {} - {}", b.title, money(b.price));
                }
                None => {
                    let _ = write!(out, "\nUpdated book: not found");
                }
            }
        }
        Outcome::Deleted { deleted, .. } => {
            let _ = write!(out, "Deleted {deleted} document(s)");
        }
        Outcome::Averages { by, rows } => {
            let _ = write!(out, "Average price by {by}:");
            for r in rows {
                let avg = r.average.map_or_else(|| "n/a".to_string(), money);
                let _ = write!(out, "\n- {}: {avg} ({} books)", group_label(&r.group), r.count);
            }
        }
        Outcome::Top { by, row } => {
            let _ = write!(out, "{by} with most books:");
            if let Some(r) = row {
                let _ = write!(out, "\n- {}: {} books", group_label(&r.group), r.count);
            }
        }
        Outcome::Buckets { rows } => {
            let _ = write!(out, "Books by publication decade:");
            for r in rows {
                let label = r.bucket.map_or_else(|| "(none)".to_string(), |b| format!("{b}s"));
                let _ = write!(out, "\n- {label}: {} books", r.count);
            }
        }
        Outcome::IndexesCreated { names } => {
            for (i, n) in names.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                let _ = write!(out, "Index created: {n}");
            }
            let _ = write!(out, "\nAll indexes created successfully");
        }
        Outcome::Indexes { indexes } => {
            let _ = write!(out, "Current indexes:");
            for (i, idx) in indexes.iter().enumerate() {
                let _ = write!(out, "\n{}. {}", i + 1, index_keys_label(&idx.keys));
            }
        }
    }
    out
}

/// Full console output of the demo.
#[must_use]
pub fn render_text(report: &DemoReport) -> String {
    let mut out = format!("{RULE}\n{BANNER}\n{RULE}\n");
    let mut task = None;
    for s in &report.sections {
        if task != Some(s.task) {
            let _ = writeln!(out, "\n=== {} ===", s.task.heading());
            task = Some(s.task);
        }
        let _ = writeln!(out, "\n{}", render_section(s));
    }
    out.push_str("\nALL TASKS COMPLETED SUCCESSFULLY!\n");
    out
}

/// One JSON object per section, newline separated.
///
/// # Errors
/// Propagates serialization failures.
pub fn render_ndjson(report: &DemoReport) -> Result<String> {
    let mut out = String::new();
    for s in &report.sections {
        out.push_str(&serde_json::to_string(s)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::sample_books;
    use crate::query::Order;

    #[test]
    fn book_lines_follow_style() {
        let dune = sample_books().remove(8);
        assert_eq!(book_line(&dune, LineStyle::ByAuthor), "- Dune by Frank Herbert");
        assert_eq!(book_line(&dune, LineStyle::Year), "- Dune (1965)");
        assert_eq!(book_line(&dune, LineStyle::YearAndPrice), "- Dune (1965) - $14.99");
        assert_eq!(book_line(&dune, LineStyle::Price), "- Dune: $14.99");
    }

    #[test]
    fn index_labels_look_like_key_documents() {
        let keys = vec![
            SortSpec { field: "author".into(), order: Order::Asc },
            SortSpec { field: "published_year".into(), order: Order::Desc },
        ];
        assert_eq!(index_keys_label(&keys), "{\"author\": 1, \"published_year\": -1}");
    }

    #[test]
    fn text_groups_sections_under_task_headings() {
        let mut r = DemoReport::default();
        r.push(Task::BasicCrud, "Deleting book: 1984", Outcome::Deleted { title: "1984".into(), deleted: 1 });
        r.push(
            Task::Aggregation,
            "Books by publication decade",
            Outcome::Buckets {
                rows: vec![
                    Bucket { bucket: None, count: 2, members: vec!["y".into(), "z".into()] },
                    Bucket { bucket: Some(1920), count: 1, members: vec!["x".into()] },
                ],
            },
        );
        let text = render_text(&r);
        assert!(text.contains("=== TASK 2: BASIC CRUD OPERATIONS ===\n\nDeleting book: 1984\nDeleted 1 document(s)"));
        assert!(text.contains("Books by publication decade:\n- (none): 2 books\n- 1920s: 1 books"));
        assert!(text.ends_with("ALL TASKS COMPLETED SUCCESSFULLY!\n"));
    }

    #[test]
    fn ndjson_has_one_tagged_object_per_section() {
        let mut r = DemoReport::default();
        r.push(Task::BasicCrud, "a", Outcome::Deleted { title: "1984".into(), deleted: 0 });
        r.push(Task::Indexing, "b", Outcome::IndexesCreated { names: vec!["title_1".into()] });
        let s = render_ndjson(&r).unwrap();
        let lines: Vec<serde_json::Value> =
            s.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "deleted");
        assert_eq!(lines[0]["task"], "basic_crud");
        assert_eq!(lines[1]["names"][0], "title_1");
    }
}
