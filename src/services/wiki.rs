// src/services/wiki.rs

//! Release table parsing for wiki-hosted listings.

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::ReleaseRecord;

/// Part name recorded on wiki rows.
pub const WIKI_PART: &str = "wiki";

/// Typed field a header maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Date,
    Tag,
    Chipset,
    Manifest,
    Android,
    Other,
}

impl Field {
    fn from_header(header: &str) -> Self {
        let header = header.to_lowercase();
        if header.contains("tag") {
            Field::Tag
        } else if header.contains("date") {
            Field::Date
        } else if header.contains("chipset") {
            Field::Chipset
        } else if header.contains("manifest") {
            Field::Manifest
        } else if header.contains("android") {
            Field::Android
        } else {
            Field::Other
        }
    }
}

/// Parse the first `<table>` of `html` into records, in row order.
///
/// Header cells name the columns; rows without a tag are skipped.
pub fn parse_release_table(html: &str) -> Result<Vec<ReleaseRecord>> {
    let document = Html::parse_document(html);
    let table_selector = parse_selector("table")?;
    let row_selector = parse_selector("tr")?;
    let header_selector = parse_selector("th")?;
    let cell_selector = parse_selector("td")?;

    let table = document
        .select(&table_selector)
        .next()
        .ok_or_else(|| AppError::fetch(WIKI_PART, "no release table found"))?;

    let mut headers: Vec<String> = Vec::new();
    let mut records = Vec::new();
    for row in table.select(&row_selector) {
        if headers.is_empty() {
            headers = row.select(&header_selector).map(cell_text).collect();
            if !headers.is_empty() {
                continue;
            }
        }

        let cells: Vec<String> = row.select(&cell_selector).map(cell_text).collect();
        if cells.is_empty() {
            continue;
        }
        match row_to_record(&headers, cells) {
            Some(record) => records.push(record),
            None => log::debug!("Skipping wiki row without a tag"),
        }
    }

    if headers.is_empty() {
        return Err(AppError::fetch(WIKI_PART, "release table has no header row"));
    }
    Ok(records)
}

fn row_to_record(headers: &[String], cells: Vec<String>) -> Option<ReleaseRecord> {
    let mut record = ReleaseRecord::new("", WIKI_PART, "");
    for (header, value) in headers.iter().zip(cells) {
        match Field::from_header(header) {
            Field::Tag => record.tag = value.clone(),
            Field::Date => record.date = value.clone(),
            Field::Chipset => record.chipset = non_empty(&value),
            Field::Manifest => record.manifest = non_empty(&value),
            Field::Android => record.android = non_empty(&value),
            Field::Other => {}
        }
        record.columns.insert(header.clone(), value);
    }
    (!record.tag.is_empty()).then_some(record)
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
