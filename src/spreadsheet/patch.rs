//! Streaming worksheet patcher.
//!
//! Rewrites a worksheet part event by event, merging cell patches into
//! `<sheetData>` in A1 order. Rows and cells that are not patched are copied
//! through unchanged, so styles, merged ranges, column widths and everything
//! outside `<sheetData>` survive the edit.
//!
//! Overwriting the master cell of a shared formula leaves its dependents
//! without a definition, so their `<f>` is stripped and their cached value kept.

use crate::error::TemplateFillError;
use crate::helpers::xml::passthrough_reader;
use crate::helpers::xml::prefixed_tag;
use crate::helpers::xml::write_text_element;
use crate::helpers::xml::XmlNodeHelper;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::reference::Area;
use crate::spreadsheet::styles::DateStyles;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use quick_xml::Writer;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::io::BufRead;
use std::io::Write;
use thiserror::Error;

/// Cell attributes that describe the old value and must not survive a rewrite
const STALE_CELL_ATTRIBUTES: [&[u8]; 4] = [b"r", b"t", b"cm", b"vm"];

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Worksheet part '{0}' has no <sheetData> section")]
    MissingSheetDataError(String),

    #[error("Worksheet part '{0}' not found in package")]
    MissingWorksheetPartError(String),
}

/// One value to place into a worksheet cell, at 0-based coordinates.
/// An [`CellValue::Empty`] value clears an existing cell and keeps its style.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct CellPatch {
    pub(crate) row: usize,
    pub(crate) col: usize,
    pub(crate) value: CellValue,
}

/// What a patch run changed
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct PatchSummary {
    /// Cells written, replaced or cleared
    pub(crate) cells_written: usize,
    /// Overwritten cells that carried a formula
    pub(crate) formulas_removed: usize,
}

/// Pending values of one row, keyed by column
type PendingRow<'a> = BTreeMap<usize, &'a CellValue>;

struct Patcher<'a, 's, W: Write> {
    writer: Writer<W>,
    rows: BTreeMap<usize, PendingRow<'a>>,
    /// Namespace prefix used by `<sheetData>`, reused for inserted elements
    prefix: Option<String>,
    styles: &'s mut DateStyles,
    summary: PatchSummary,
}

impl<'a, W: Write> Patcher<'a, '_, W> {
    /// Writes one patched cell. `original` is the element being replaced, if any.
    fn write_cell(
        &mut self,
        row: usize,
        col: usize,
        value: &CellValue,
        original: Option<&BytesStart<'_>>,
    ) -> Result<(), TemplateFillError> {
        let tag = match original {
            Some(original) => String::from_utf8_lossy(original.name().as_ref()).into_owned(),
            None => prefixed_tag(self.prefix.as_deref(), "c"),
        };
        let child_prefix = tag.split_once(':').map(|(prefix, _)| prefix);
        let value_tag = prefixed_tag(child_prefix, "v");
        let reference = index_to_reference(row, col);
        let style = match value {
            CellValue::Date { serial, .. } => {
                let current = match original {
                    Some(original) => original.get_attribute_value("s")?.and_then(|style| style.parse::<usize>().ok()),
                    None => None,
                };
                self.styles.date_style(current, *serial)?.map(|style| style.to_string())
            }
            _ => None,
        };

        let mut start = BytesStart::new(tag.as_str());
        start.push_attribute(("r", reference.as_str()));
        if let Some(style) = &style {
            start.push_attribute(("s", style.as_str()));
        }
        if let Some(original) = original {
            for attribute in original.attributes() {
                let attribute = attribute?;
                let key = attribute.key.as_ref();
                if !STALE_CELL_ATTRIBUTES.contains(&key) && !(style.is_some() && key == b"s") {
                    start.push_attribute(attribute);
                }
            }
        }

        let writer = &mut self.writer;
        match value {
            CellValue::Empty => writer.write_event(Event::Empty(start))?,
            CellValue::Boolean(flag) => {
                start.push_attribute(("t", "b"));
                writer.write_event(Event::Start(start))?;
                write_text_element(writer, &value_tag, if *flag { "1" } else { "0" })?;
                writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
            }
            CellValue::Number(number) => {
                writer.write_event(Event::Start(start))?;
                write_text_element(writer, &value_tag, number)?;
                writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
            }
            CellValue::Date { serial, .. } => {
                writer.write_event(Event::Start(start))?;
                write_text_element(writer, &value_tag, &serial.to_string())?;
                writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
            }
            CellValue::Text(text) => {
                let inline_tag = prefixed_tag(child_prefix, "is");
                start.push_attribute(("t", "inlineStr"));
                writer.write_event(Event::Start(start))?;
                writer.write_event(Event::Start(BytesStart::new(inline_tag.as_str())))?;
                write_text_element(writer, &prefixed_tag(child_prefix, "t"), text)?;
                writer.write_event(Event::End(BytesEnd::new(inline_tag.as_str())))?;
                writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
            }
            CellValue::Error(error) => {
                start.push_attribute(("t", "e"));
                writer.write_event(Event::Start(start))?;
                write_text_element(writer, &value_tag, error)?;
                writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
            }
        }
        self.summary.cells_written += 1;
        Ok(())
    }

    /// Inserts the pending cells of a row whose column is before `before` (all when `None`).
    /// Empty values have nothing to clear here and are dropped.
    fn flush_row_cells(
        &mut self,
        row: usize,
        pending: &mut PendingRow<'a>,
        before: Option<usize>,
    ) -> Result<(), TemplateFillError> {
        while let Some(entry) = pending.first_entry() {
            if before.is_some_and(|limit| *entry.key() >= limit) {
                break;
            }
            let (col, value) = entry.remove_entry();
            if !value.is_empty() {
                self.write_cell(row, col, value, None)?;
            }
        }
        Ok(())
    }

    /// Inserts a new `<row>` holding only patched cells
    fn write_inserted_row(&mut self, row: usize, mut pending: PendingRow<'a>) -> Result<(), TemplateFillError> {
        pending.retain(|_, value| !value.is_empty());
        let (Some(first), Some(last)) = (pending.keys().next().copied(), pending.keys().next_back().copied()) else {
            return Ok(());
        };
        let tag = prefixed_tag(self.prefix.as_deref(), "row");
        let number = (row + 1).to_string();
        let spans = format!("{}:{}", first + 1, last + 1);
        let mut start = BytesStart::new(tag.as_str());
        start.push_attribute(("r", number.as_str()));
        start.push_attribute(("spans", spans.as_str()));
        self.writer.write_event(Event::Start(start))?;
        self.flush_row_cells(row, &mut pending, None)?;
        self.writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
        Ok(())
    }

    /// Inserts pending rows numbered before `before` (all when `None`)
    fn flush_rows(&mut self, before: Option<usize>) -> Result<(), TemplateFillError> {
        while let Some(entry) = self.rows.first_entry() {
            if before.is_some_and(|limit| *entry.key() >= limit) {
                break;
            }
            let (row, pending) = entry.remove_entry();
            self.write_inserted_row(row, pending)?;
        }
        Ok(())
    }
}

/// Applies cell patches to a worksheet part
///
/// # Arguments
/// * `input` - Original worksheet XML
/// * `output` - Destination of the rewritten XML
/// * `part` - Part name, used in error messages
/// * `patches` - Cells to write; a later patch for the same cell wins
/// * `styles` - Styles of the workbook; date cells may be given a date style
pub(crate) fn patch_worksheet<R: BufRead, W: Write>(
    input: R,
    output: W,
    part: &str,
    patches: &[CellPatch],
    styles: &mut DateStyles,
) -> Result<PatchSummary, TemplateFillError> {
    let mut rows: BTreeMap<usize, PendingRow> = BTreeMap::new();
    let mut bounds: Option<Area> = None;
    for patch in patches {
        rows.entry(patch.row).or_default().insert(patch.col, &patch.value);
        if !patch.value.is_empty() {
            bounds = Some(match bounds {
                Some(area) => area.include(patch.row, patch.col),
                None => Area::cell(patch.row, patch.col),
            });
        }
    }

    let mut patcher = Patcher {
        writer: Writer::new(output),
        rows,
        prefix: None,
        styles,
        summary: PatchSummary::default(),
    };
    let mut reader = passthrough_reader(input);
    let mut buffer = Vec::new();
    let mut in_sheet_data = false;
    let mut saw_sheet_data = false;
    let mut current: Option<(usize, PendingRow)> = None;
    let mut next_row = 0usize;
    let mut next_col = 0usize;
    // `si` of shared formula groups whose master cell was overwritten
    let mut orphaned_groups = BTreeSet::new();

    loop {
        let event = reader.read_event_into(&mut buffer)?;
        match event {
            Event::Eof => break,

            Event::Start(ref e) if is_tag(e, b"dimension") => {
                patcher.writer.write_event(Event::Start(updated_dimension(e, bounds)?))?;
            }
            Event::Empty(ref e) if is_tag(e, b"dimension") => {
                patcher.writer.write_event(Event::Empty(updated_dimension(e, bounds)?))?;
            }

            Event::Start(ref e) if is_tag(e, b"sheetData") => {
                in_sheet_data = true;
                saw_sheet_data = true;
                patcher.prefix = e.prefix();
                patcher.writer.write_event(Event::Start(e.borrow()))?;
            }
            Event::Empty(ref e) if is_tag(e, b"sheetData") => {
                saw_sheet_data = true;
                patcher.prefix = e.prefix();
                if patcher.rows.is_empty() {
                    patcher.writer.write_event(Event::Empty(e.borrow()))?;
                } else {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    patcher.writer.write_event(Event::Start(e.borrow()))?;
                    patcher.flush_rows(None)?;
                    patcher.writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
                }
            }
            Event::End(ref e) if e.local_name().as_ref() == b"sheetData" => {
                patcher.flush_rows(None)?;
                in_sheet_data = false;
                patcher.writer.write_event(Event::End(e.borrow()))?;
            }

            Event::Start(ref e) if in_sheet_data && is_tag(e, b"row") => {
                let row = row_index(e)?.unwrap_or(next_row);
                next_row = row + 1;
                next_col = 0;
                patcher.flush_rows(Some(row))?;
                match patcher.rows.remove(&row) {
                    Some(pending) => {
                        patcher.writer.write_event(Event::Start(updated_spans(e, &pending)?))?;
                        current = Some((row, pending));
                    }
                    None => patcher.writer.write_event(Event::Start(e.borrow()))?,
                }
            }
            Event::Empty(ref e) if in_sheet_data && is_tag(e, b"row") => {
                let row = row_index(e)?.unwrap_or(next_row);
                next_row = row + 1;
                patcher.flush_rows(Some(row))?;
                match patcher.rows.remove(&row) {
                    Some(mut pending) => {
                        let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        patcher.writer.write_event(Event::Start(updated_spans(e, &pending)?))?;
                        patcher.flush_row_cells(row, &mut pending, None)?;
                        patcher.writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
                    }
                    None => patcher.writer.write_event(Event::Empty(e.borrow()))?,
                }
            }
            Event::End(ref e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                if let Some((row, mut pending)) = current.take() {
                    patcher.flush_row_cells(row, &mut pending, None)?;
                }
                patcher.writer.write_event(Event::End(e.borrow()))?;
            }

            Event::Start(ref e) if in_sheet_data && is_tag(e, b"c") => match current.as_mut() {
                Some((row, pending)) => {
                    let col = cell_col(e)?.unwrap_or(next_col);
                    next_col = col + 1;
                    patcher.flush_row_cells(*row, pending, Some(col))?;
                    match pending.remove(&col) {
                        Some(value) => {
                            let skipped = skip_children(&mut reader)?;
                            if skipped.has_formula {
                                patcher.summary.formulas_removed += 1;
                            }
                            orphaned_groups.extend(skipped.shared_group);
                            patcher.write_cell(*row, col, value, Some(e))?;
                        }
                        None => {
                            patcher.writer.write_event(Event::Start(e.borrow()))?;
                            patcher.summary.formulas_removed +=
                                copy_children(&mut reader, &mut patcher.writer, &orphaned_groups)?;
                        }
                    }
                }
                None => {
                    patcher.writer.write_event(Event::Start(e.borrow()))?;
                    patcher.summary.formulas_removed +=
                        copy_children(&mut reader, &mut patcher.writer, &orphaned_groups)?;
                }
            },
            Event::Empty(ref e) if in_sheet_data && is_tag(e, b"c") => match current.as_mut() {
                Some((row, pending)) => {
                    let col = cell_col(e)?.unwrap_or(next_col);
                    next_col = col + 1;
                    patcher.flush_row_cells(*row, pending, Some(col))?;
                    match pending.remove(&col) {
                        Some(value) => patcher.write_cell(*row, col, value, Some(e))?,
                        None => patcher.writer.write_event(Event::Empty(e.borrow()))?,
                    }
                }
                None => patcher.writer.write_event(Event::Empty(e.borrow()))?,
            },

            // Cells must come before anything else in a row, e.g. `<extLst>`.
            Event::Start(ref e) if current.is_some() => {
                if let Some((row, pending)) = current.as_mut() {
                    patcher.flush_row_cells(*row, pending, None)?;
                }
                patcher.writer.write_event(Event::Start(e.borrow()))?;
            }
            Event::Empty(ref e) if current.is_some() => {
                if let Some((row, pending)) = current.as_mut() {
                    patcher.flush_row_cells(*row, pending, None)?;
                }
                patcher.writer.write_event(Event::Empty(e.borrow()))?;
            }

            other => patcher.writer.write_event(other)?,
        }
        buffer.clear();
    }

    if !saw_sheet_data {
        Err(PatchError::MissingSheetDataError(part.to_owned()))?;
    }
    Ok(patcher.summary)
}

fn is_tag(element: &BytesStart<'_>, local: &[u8]) -> bool {
    element.local_name().as_ref() == local
}

/// 0-based row index from the `r` attribute
fn row_index(element: &BytesStart<'_>) -> Result<Option<usize>, TemplateFillError> {
    Ok(element.parse_attribute_value::<usize>("r")?.and_then(|number| number.checked_sub(1)))
}

/// 0-based column index from the `r` attribute
fn cell_col(element: &BytesStart<'_>) -> Result<Option<usize>, TemplateFillError> {
    Ok(element
        .get_attribute_value("r")?
        .and_then(|reference| reference_to_index(&reference))
        .map(|(_, col)| col))
}

/// Copies an element with one attribute value replaced
fn with_attribute(element: &BytesStart<'_>, key: &[u8], value: &str) -> Result<BytesStart<'static>, TemplateFillError> {
    let mut updated = BytesStart::new(String::from_utf8_lossy(element.name().as_ref()).into_owned());
    for attribute in element.attributes() {
        let attribute = attribute?;
        if attribute.key.as_ref() == key {
            updated.push_attribute((key, value.as_bytes()));
        } else {
            updated.push_attribute(attribute);
        }
    }
    Ok(updated)
}

/// Widens `<dimension ref>` to cover the written cells
fn updated_dimension(element: &BytesStart<'_>, bounds: Option<Area>) -> Result<BytesStart<'static>, TemplateFillError> {
    let existing = element.get_attribute_value("ref")?.and_then(|reference| Area::parse(&reference));
    match existing.zip(bounds) {
        Some((existing, bounds)) => with_attribute(element, b"ref", &existing.union(bounds).to_string()),
        None => Ok(element.clone().into_owned()),
    }
}

/// Widens a row's `spans="first:last"` hint (1-based columns) to cover pending cells
fn updated_spans(element: &BytesStart<'_>, pending: &PendingRow) -> Result<BytesStart<'static>, TemplateFillError> {
    let spans = element.get_attribute_value("spans")?.and_then(|spans| {
        let (first, last) = spans.split_once(':')?;
        Some((first.parse::<usize>().ok()?, last.parse::<usize>().ok()?))
    });
    let written = pending.iter().filter(|(_, value)| !value.is_empty()).map(|(col, _)| *col);
    let (first_written, last_written) = (written.clone().min(), written.max());
    match (spans, first_written, last_written) {
        (Some((first, last)), Some(first_written), Some(last_written)) => {
            let spans = format!("{}:{}", first.min(first_written + 1), last.max(last_written + 1));
            with_attribute(element, b"spans", &spans)
        }
        _ => Ok(element.clone().into_owned()),
    }
}

/// Formula content of a cell dropped by [`skip_children`]
#[derive(Default)]
struct SkippedCell {
    has_formula: bool,
    /// `si` of the shared formula group the cell defined, if it was a master
    shared_group: Option<String>,
}

/// Consumes the children of an element up to its closing tag
fn skip_children<R: BufRead>(reader: &mut Reader<R>) -> Result<SkippedCell, TemplateFillError> {
    let mut buffer = Vec::new();
    let mut depth = 0usize;
    let mut skipped = SkippedCell::default();
    loop {
        match reader.read_event_into(&mut buffer)? {
            Event::Start(ref e) => {
                skipped.inspect(e)?;
                depth += 1;
            }
            Event::Empty(ref e) => skipped.inspect(e)?,
            Event::End(_) if depth == 0 => break,
            Event::End(_) => depth -= 1,
            Event::Eof => break,
            _ => (),
        }
        buffer.clear();
    }
    Ok(skipped)
}

impl SkippedCell {
    fn inspect(&mut self, element: &BytesStart<'_>) -> Result<(), TemplateFillError> {
        if !is_tag(element, b"f") {
            return Ok(());
        }
        self.has_formula = true;
        if is_shared_formula(element)? && element.try_get_attribute("ref")?.is_some() {
            self.shared_group = element.get_attribute_value("si")?.map(|group| group.into_owned());
        }
        Ok(())
    }
}

fn is_shared_formula(element: &BytesStart<'_>) -> Result<bool, TemplateFillError> {
    Ok(element.get_attribute_value("t")?.is_some_and(|kind| kind == "shared"))
}

/// Whether `element` is an `<f>` referring to a shared group listed in `groups`
fn is_orphaned_formula(element: &BytesStart<'_>, groups: &BTreeSet<String>) -> Result<bool, TemplateFillError> {
    if groups.is_empty() || !is_tag(element, b"f") || !is_shared_formula(element)? {
        return Ok(false);
    }
    Ok(element.get_attribute_value("si")?.is_some_and(|group| groups.contains(group.as_ref())))
}

/// Copies the children of an element and its closing tag. Formulas of the
/// shared groups in `orphaned_groups` are left out; returns how many were.
fn copy_children<R: BufRead, W: Write>(
    reader: &mut Reader<R>,
    writer: &mut Writer<W>,
    orphaned_groups: &BTreeSet<String>,
) -> Result<usize, TemplateFillError> {
    let mut buffer = Vec::new();
    let mut depth = 0usize;
    let mut stripped = 0usize;
    loop {
        let event = reader.read_event_into(&mut buffer)?;
        let is_orphaned = match &event {
            Event::Start(e) | Event::Empty(e) => is_orphaned_formula(e, orphaned_groups)?,
            _ => false,
        };
        if is_orphaned {
            if matches!(event, Event::Start(_)) {
                skip_children(reader)?;
            }
            stripped += 1;
        } else {
            let closes = match &event {
                Event::Eof => return Ok(stripped),
                Event::Start(_) => {
                    depth += 1;
                    false
                }
                Event::End(_) if depth == 0 => true,
                Event::End(_) => {
                    depth -= 1;
                    false
                }
                _ => false,
            };
            writer.write_event(event)?;
            if closes {
                return Ok(stripped);
            }
        }
        buffer.clear();
    }
}
