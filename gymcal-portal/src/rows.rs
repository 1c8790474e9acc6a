//! Table rows out of rendered schedule HTML.

use scraper::{ElementRef, Html, Selector};

use crate::error::{PortalError, PortalResult};

/// Rows with fewer cells are headers or spacers.
pub const MIN_CELLS: usize = 5;

/// Text of one schedule row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// Position among all elements matching the row selector, for clicking
    /// back into the live page.
    pub index: usize,
    pub cells: Vec<String>,
}

/// All rows matching `row_selector` that have at least [`MIN_CELLS`] cells.
pub fn extract_rows(html: &str, row_selector: &str) -> PortalResult<Vec<RawRow>> {
    let rows = Selector::parse(row_selector)
        .map_err(|_| PortalError::Selector(row_selector.to_string()))?;
    let cells = Selector::parse("td").map_err(|_| PortalError::Selector("td".to_string()))?;

    let document = Html::parse_document(html);

    Ok(document
        .select(&rows)
        .enumerate()
        .filter_map(|(index, row)| {
            let texts: Vec<String> = row.select(&cells).map(cell_text).collect();
            (texts.len() >= MIN_CELLS).then_some(RawRow { index, cells: texts })
        })
        .collect())
}

/// Trimmed text nodes of a cell, empties dropped, one per line.
pub fn cell_text(cell: ElementRef) -> String {
    cell.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
