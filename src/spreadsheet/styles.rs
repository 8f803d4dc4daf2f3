//! Date styles for written date cells.
//!
//! A date serial only shows as a date under a date number format. When the
//! destination cell's style has none, the cell gets a `cellXfs` entry that
//! copies its style with the number format swapped for a built-in date
//! format. Matching entries already in the styles part are reused; the
//! others are appended to `cellXfs`.

use crate::error::TemplateFillError;
use crate::helpers::xml::passthrough_reader;
use crate::spreadsheet::cell::CellType;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Writer;
use std::collections::BTreeMap;

pub(crate) const STYLES_PART: &str = "xl/styles.xml";

const CELL_FORMATS: &[u8] = b"cellXfs";
const CELL_FORMAT: &[u8] = b"xf";

/// Built-in `m/d/yyyy`
const DATE_FORMAT_ID: u32 = 14;
/// Built-in `m/d/yyyy h:mm`
const DATE_TIME_FORMAT_ID: u32 = 22;

/// One `<xf>` element with its children, as owned events
type CellFormat = Vec<Event<'static>>;

/// The `cellXfs` entries of a workbook, plus those added for date cells
#[derive(Debug, Default)]
pub(crate) struct DateStyles {
    formats: Vec<CellFormat>,
    /// Whether each existing entry formats numbers as dates
    is_date: Vec<bool>,
    /// Style handed out per (base style, number format)
    chosen: BTreeMap<(usize, u32), usize>,
    appended: Vec<CellFormat>,
}

impl DateStyles {
    /// Reads the `cellXfs` entries of a styles part
    ///
    /// # Arguments
    /// * `bytes` - Content of the styles part
    /// * `number_formats` - Storage kind of each entry, as resolved by the reader
    pub(crate) fn from_styles_part(bytes: &[u8], number_formats: &[CellType]) -> Result<DateStyles, TemplateFillError> {
        let mut reader = passthrough_reader(bytes);
        let mut buffer = Vec::new();
        let mut formats = Vec::new();
        let mut current: Option<CellFormat> = None;
        let mut depth = 0usize;
        let mut in_cell_formats = false;
        loop {
            let event = reader.read_event_into(&mut buffer)?;
            if let Some(format) = current.as_mut() {
                let closes = match &event {
                    Event::Eof => break,
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
                format.push(event.into_owned());
                if closes {
                    formats.extend(current.take());
                }
                buffer.clear();
                continue;
            }
            match event {
                Event::Eof => break,
                Event::Start(ref e) if e.local_name().as_ref() == CELL_FORMATS => in_cell_formats = true,
                Event::End(ref e) if e.local_name().as_ref() == CELL_FORMATS => in_cell_formats = false,
                Event::Start(e) if in_cell_formats && e.local_name().as_ref() == CELL_FORMAT => {
                    depth = 0;
                    current = Some(vec![Event::Start(e.into_owned())]);
                }
                Event::Empty(e) if in_cell_formats && e.local_name().as_ref() == CELL_FORMAT => {
                    formats.push(vec![Event::Empty(e.into_owned())]);
                }
                _ => (),
            }
            buffer.clear();
        }

        let is_date = number_formats.iter().map(|kind| kind.is_date()).collect();
        Ok(DateStyles { formats, is_date, ..DateStyles::default() })
    }

    /// Style to give a cell receiving a date serial
    ///
    /// Returns `None` when the cell's style (`current`, style 0 when absent)
    /// already shows dates, or when there is no such style to derive from.
    /// Whole days get `m/d/yyyy`, serials with a time of day `m/d/yyyy h:mm`.
    pub(crate) fn date_style(&mut self, current: Option<usize>, serial: f64) -> Result<Option<usize>, TemplateFillError> {
        let base = current.unwrap_or(0);
        if self.is_date.get(base).copied().unwrap_or(false) {
            return Ok(None);
        }
        let Some(source) = self.formats.get(base) else {
            return Ok(None);
        };
        let format_id = if serial.fract() == 0.0 { DATE_FORMAT_ID } else { DATE_TIME_FORMAT_ID };
        if let Some(index) = self.chosen.get(&(base, format_id)) {
            return Ok(Some(*index));
        }

        let candidate = with_number_format(source, format_id)?;
        let index = match self.formats.iter().position(|format| *format == candidate) {
            Some(index) => index,
            None => {
                self.appended.push(candidate);
                self.formats.len() + self.appended.len() - 1
            }
        };
        self.chosen.insert((base, format_id), index);
        Ok(Some(index))
    }

    /// Whether the styles part needs rewriting
    pub(crate) fn has_additions(&self) -> bool {
        !self.appended.is_empty()
    }

    /// Copies the styles part with the added entries at the end of `cellXfs`
    pub(crate) fn rewrite(&self, bytes: &[u8]) -> Result<Vec<u8>, TemplateFillError> {
        let count = (self.formats.len() + self.appended.len()).to_string();
        let mut reader = passthrough_reader(bytes);
        let mut writer = Writer::new(Vec::with_capacity(bytes.len()));
        let mut buffer = Vec::new();
        loop {
            match reader.read_event_into(&mut buffer)? {
                Event::Eof => break,
                Event::Start(ref e) if e.local_name().as_ref() == CELL_FORMATS => {
                    let updated = match e.try_get_attribute("count")? {
                        Some(_) => set_attributes(e, &[(b"count".as_slice(), count.as_str())])?,
                        None => e.clone().into_owned(),
                    };
                    writer.write_event(Event::Start(updated))?;
                }
                Event::End(ref e) if e.local_name().as_ref() == CELL_FORMATS => {
                    for event in self.appended.iter().flatten() {
                        writer.write_event(event.clone())?;
                    }
                    writer.write_event(Event::End(e.borrow()))?;
                }
                event => writer.write_event(event)?,
            }
            buffer.clear();
        }
        Ok(writer.into_inner())
    }
}

/// Copy of an `<xf>` using another number format
fn with_number_format(format: &CellFormat, format_id: u32) -> Result<CellFormat, TemplateFillError> {
    let format_id = format_id.to_string();
    let changes = [(b"numFmtId".as_slice(), format_id.as_str()), (b"applyNumberFormat".as_slice(), "1")];
    format
        .iter()
        .enumerate()
        .map(|(index, event)| match event {
            Event::Start(e) if index == 0 => Ok(Event::Start(set_attributes(e, &changes)?)),
            Event::Empty(e) if index == 0 => Ok(Event::Empty(set_attributes(e, &changes)?)),
            other => Ok(other.clone()),
        })
        .collect()
}

/// Copies an element with attribute values replaced, appending those it lacks
fn set_attributes(element: &BytesStart<'_>, changes: &[(&[u8], &str)]) -> Result<BytesStart<'static>, TemplateFillError> {
    let mut updated = BytesStart::new(String::from_utf8_lossy(element.name().as_ref()).into_owned());
    let mut applied = vec![false; changes.len()];
    for attribute in element.attributes() {
        let attribute = attribute?;
        match changes.iter().position(|(key, _)| *key == attribute.key.as_ref()) {
            Some(index) => {
                updated.push_attribute((changes[index].0, changes[index].1.as_bytes()));
                applied[index] = true;
            }
            None => updated.push_attribute(attribute),
        }
    }
    for ((key, value), applied) in changes.iter().zip(applied) {
        if !applied {
            updated.push_attribute((*key, value.as_bytes()));
        }
    }
    Ok(updated)
}
