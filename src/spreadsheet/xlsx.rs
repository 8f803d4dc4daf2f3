use crate::error::ResultMessage;
use crate::error::TemplateFillError;
use crate::helpers::reader::WorkbookReader;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::CellValue;
use crate::spreadsheet::excel;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::excel::REL_TYPE_WORKSHEET;
use crate::spreadsheet::package;
use crate::spreadsheet::patch::CellPatch;
use crate::spreadsheet::patch::PatchSummary;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::styles::STYLES_PART;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use zip::ZipArchive;

// Local names of the SpreadsheetML elements read below. Matching on local
// names accepts both default-namespace and `x:`-prefixed parts.
const SHEET: &[u8] = b"sheet";
const WORKBOOK_PROPERTIES: &[u8] = b"workbookPr";
const NUMBER_FORMATS: &[u8] = b"numFmts";
const NUMBER_FORMAT: &[u8] = b"numFmt";
const CELL_FORMATS: &[u8] = b"cellXfs";
const CELL_FORMAT: &[u8] = b"xf";
const STRING_ITEM: &[u8] = b"si";
const PHONETIC_RUN: &[u8] = b"rPh";
const TEXT: &[u8] = b"t";
const ROW: &[u8] = b"row";
const CELL: &[u8] = b"c";
const INLINE_STRING: &[u8] = b"is";
const VALUE: &[u8] = b"v";

/// An Excel Open XML workbook opened for reading and patching
pub struct Workbook {
    /// File name of the workbook, used in messages
    name: String,
    zip: ZipArchive<WorkbookReader>,
    /// Storage kind implied by each `cellXfs` style, indexed by style ID
    number_formats: Vec<CellType>,
    /// Worksheets as (name, part) pairs in workbook order
    sheets: Vec<(String, String)>,
    is_1904: bool,
    /// Shared string table, loaded on first sheet read
    shared_strings: Option<Vec<String>>,
}

impl Workbook {
    /// Opens a workbook file from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Workbook, TemplateFillError> {
        let path = path.as_ref();
        let name = path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let reader = WorkbookReader::open(path).with_prefix(&format!("Open '{}'", path.display()))?;
        Workbook::from_reader(&name, reader)
    }

    /// Opens a workbook from uploaded bytes
    ///
    /// # Arguments
    /// * `name` - File name shown in messages
    /// * `bytes` - Complete content of the `.xlsx` file
    pub fn from_bytes(name: &str, bytes: Vec<u8>) -> Result<Workbook, TemplateFillError> {
        Workbook::from_reader(name, WorkbookReader::from_bytes(bytes))
    }

    fn from_reader(name: &str, mut reader: WorkbookReader) -> Result<Workbook, TemplateFillError> {
        if reader.is_compound_file()? {
            Err(SpreadsheetError::SpreadsheetPasswordProtectedError(name.to_owned()))?;
        }

        let mut zip = ZipArchive::new(reader)
            .map_err(TemplateFillError::from)
            .with_prefix(&format!("Read '{name}'"))?;
        let (sheets, is_1904) = read_workbook_part(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?
        }
        let number_formats = read_styles_part(&mut zip, is_1904)?;
        log::debug!("Opened '{}' with {} sheet(s), 1904 dates: {}", name, sheets.len(), is_1904);

        Ok(Workbook {
            name: name.to_owned(),
            zip,
            number_formats,
            sheets,
            is_1904,
            shared_strings: None,
        })
    }

    /// File name of the workbook
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sheet names in workbook order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Whether the workbook uses the 1904 date system
    pub fn is_1904(&self) -> bool {
        self.is_1904
    }

    /// Resolves a sheet name to its worksheet part
    pub(crate) fn sheet_part(&self, sheet_name: &str) -> Result<&str, SpreadsheetError> {
        self.sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, path)| path.as_str())
            .ok_or_else(|| SpreadsheetError::SheetNotFoundError {
                file_name: self.name.to_owned(),
                sheet_name: sheet_name.to_owned(),
            })
    }

    fn ensure_shared_strings(&mut self) -> Result<(), TemplateFillError> {
        if self.shared_strings.is_some() {
            return Ok(());
        }
        let mut strings = Vec::<String>::new();
        if let Some(mut reader) = self.zip.xml_reader("xl/sharedStrings.xml")? {
            match_xml_events!(reader => {
                Event::Start(event) if event.local_name().as_ref() == STRING_ITEM => {
                    strings.push(read_text(&mut reader, STRING_ITEM, false)?);
                }
            });
        }
        log::debug!("Loaded {} shared string(s) from '{}'", strings.len(), self.name);
        self.shared_strings = Some(strings);
        Ok(())
    }

    /// Reads every non-empty cell of a sheet
    ///
    /// Formula cells contribute their cached value; cells styled with a date
    /// number format become [`CellValue::Date`].
    pub fn read_sheet(&mut self, sheet_name: &str) -> Result<Sheet, TemplateFillError> {
        let part = self.sheet_part(sheet_name)?.to_owned();
        self.ensure_shared_strings()?;
        let shared_strings = self.shared_strings.as_deref().unwrap_or_default();
        let number_formats = &self.number_formats;

        let mut sheet = Sheet::new(sheet_name);
        let mut cursor = CellCursor::default();
        let mut reader = self.zip.xml_reader(&part)?
            .ok_or_else(|| SpreadsheetError::FileError(part.to_owned()))?;
        match_xml_events!(reader => {
            Event::Start(event) if event.local_name().as_ref() == ROW => {
                cursor.open_row(event.parse_attribute_value::<usize>("r")?);
            }
            Event::End(event) if event.local_name().as_ref() == ROW => cursor.close_row(),
            Event::Start(event) if event.local_name().as_ref() == CELL => {
                let position = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference));
                cursor.open_cell(position, cell_kind(&event, number_formats)?);
            }
            Event::Start(event) if cursor.is_open() && event.local_name().as_ref() == INLINE_STRING => {
                cursor.raw = read_text(&mut reader, INLINE_STRING, false)?;
            }
            Event::Start(event) if cursor.is_open() && event.local_name().as_ref() == VALUE => {
                cursor.raw = read_text(&mut reader, VALUE, true)?;
            }
            Event::End(event) if event.local_name().as_ref() == CELL => {
                if let Some((row, col, kind, raw)) = cursor.close_cell() {
                    let value = resolve_value(kind, &raw, shared_strings).map_err(|index| {
                        SpreadsheetError::SharedStringError {
                            sheet_name: sheet_name.to_owned(),
                            reference: index_to_reference(row, col),
                            index,
                        }
                    })?;
                    sheet.push(Cell { row, col, value });
                }
            }
        });
        log::debug!("Read {} cell(s) from '{}'!'{}'", sheet.cells().count(), self.name, sheet_name);
        Ok(sheet)
    }

    /// Serializes the workbook with cell patches applied to one sheet
    ///
    /// # Returns
    /// The new package bytes and a summary of what the patch changed
    pub(crate) fn write_patched(
        &mut self,
        sheet_name: &str,
        patches: &[CellPatch],
    ) -> Result<(Vec<u8>, PatchSummary), TemplateFillError> {
        let part = self.sheet_part(sheet_name)?.to_owned();
        package::write_package(&mut self.zip, &part, patches, &self.number_formats)
    }
}

/// Tracks where the next cell sits when `r` attributes are missing, and
/// collects the raw content of the cell being read.
#[derive(Default)]
struct CellCursor {
    next_row: usize,
    next_col: usize,
    row: usize,
    col: usize,
    kind: CellType,
    raw: String,
}

impl CellCursor {
    fn open_row(&mut self, number: Option<usize>) {
        if let Some(number) = number {
            self.next_row = number.saturating_sub(1);
        }
        self.next_col = 0;
    }

    fn close_row(&mut self) {
        self.next_row += 1;
        self.next_col = 0;
    }

    fn open_cell(&mut self, position: Option<(usize, usize)>, kind: CellType) {
        (self.row, self.col) = position.unwrap_or((self.next_row, self.next_col));
        self.next_col = self.col + 1;
        self.kind = kind;
        self.raw.clear();
    }

    fn is_open(&self) -> bool {
        self.kind != CellType::Empty
    }

    /// Ends the current cell, returning its content unless it had none
    fn close_cell(&mut self) -> Option<(usize, usize, CellType, String)> {
        let kind = std::mem::take(&mut self.kind);
        let raw = std::mem::take(&mut self.raw);
        (kind != CellType::Empty && !raw.is_empty()).then_some((self.row, self.col, kind, raw))
    }
}

/// Storage kind of a cell from its `t` attribute, refined by its style for numbers
fn cell_kind(event: &BytesStart<'_>, number_formats: &[CellType]) -> Result<CellType, TemplateFillError> {
    let kind = event.get_attribute_value("t")?
        .map_or(CellType::Number, |kind| CellType::from_type_attribute(&kind));
    if kind != CellType::Number {
        return Ok(kind);
    }
    let Some(style) = event.get_attribute_value("s")?.filter(|style| !style.is_empty()) else {
        return Ok(kind);
    };
    let index = style.parse::<usize>()?;
    match number_formats.get(index) {
        Some(format) => Ok(*format),
        None if number_formats.is_empty() => Ok(kind),
        None => Err(SpreadsheetError::StyleIndexError(index).into()),
    }
}

/// Turns raw cell text into a typed value.
/// A dangling shared string index is returned as the error.
fn resolve_value(kind: CellType, raw: &str, shared_strings: &[String]) -> Result<CellValue, usize> {
    let value = match kind {
        CellType::Empty => CellValue::Empty,
        CellType::Boolean => CellValue::Boolean(raw == "1" || raw.eq_ignore_ascii_case("true")),
        CellType::Number => CellValue::Number(raw.to_owned()),
        CellType::NumberDate1900 | CellType::NumberDate1904 => match raw.parse::<f64>() {
            Ok(serial) => CellValue::Date { serial, is_1904: kind == CellType::NumberDate1904 },
            Err(_) => CellValue::Number(raw.to_owned()),
        },
        CellType::IsoDateTime | CellType::InlineString => CellValue::Text(raw.to_owned()),
        CellType::SharedString => {
            let index = raw.trim().parse::<usize>().map_err(|_| usize::MAX)?;
            CellValue::Text(shared_strings.get(index).cloned().ok_or(index)?)
        }
        CellType::Error => CellValue::Error(raw.to_owned()),
    };
    Ok(value)
}

/// Reads the sheet list and date system from `xl/workbook.xml`.
/// Sheets without a worksheet relationship (chart sheets, dialogs) are left out.
fn read_workbook_part(zip: &mut ZipArchive<WorkbookReader>) -> Result<(Vec<(String, String)>, bool), TemplateFillError> {
    let parts = load_relationships(zip, "xl/_rels/workbook.xml.rels", REL_TYPE_WORKSHEET)?;
    let mut reader = zip.xml_reader("xl/workbook.xml")?
        .ok_or_else(|| SpreadsheetError::FileError("xl/workbook.xml".to_string()))?;
    let mut sheets = Vec::new();
    let mut is_1904 = false;
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == SHEET => {
            let (mut name, mut id) = (None, None);
            for attribute in event.attributes() {
                let attribute = attribute?;
                match attribute.key.local_name().as_ref() {
                    b"name" => name = Some(attribute.get_value()?),
                    b"id" => id = Some(attribute.get_value()?),
                    _ => (),
                }
            }
            let entry = name.zip(id).and_then(|(name, id)| {
                parts.get(id.as_ref()).map(|part| (name.into_owned(), part.to_owned()))
            });
            match entry {
                Some(entry) => sheets.push(entry),
                None => log::debug!("Skipping a sheet entry without a worksheet part"),
            }
        }
        Event::Start(event) if event.local_name().as_ref() == WORKBOOK_PROPERTIES => {
            is_1904 = event.get_attribute_value("date1904")?
                .is_some_and(|value| value == "1" || value.eq_ignore_ascii_case("true"));
        }
    });
    Ok((sheets, is_1904))
}

/// Section of `xl/styles.xml` being read
#[derive(Copy, Clone, PartialEq, Eq)]
enum StylesSection {
    Other,
    NumberFormats,
    CellFormats,
}

/// Reads the storage kind implied by each cell style from `xl/styles.xml`.
/// A package without styles yields no formats, and every number stays a number.
fn read_styles_part(zip: &mut ZipArchive<WorkbookReader>, is_1904: bool) -> Result<Vec<CellType>, TemplateFillError> {
    let Some(mut reader) = zip.xml_reader(STYLES_PART)? else {
        return Ok(Vec::new());
    };
    let mut section = StylesSection::Other;
    let mut custom_formats = HashMap::<String, CellType>::new();
    let mut format_ids = Vec::<String>::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == NUMBER_FORMATS => section = StylesSection::NumberFormats,
        Event::Start(event) if event.local_name().as_ref() == CELL_FORMATS => section = StylesSection::CellFormats,
        Event::End(event) if matches!(event.local_name().as_ref(), NUMBER_FORMATS | CELL_FORMATS) => {
            section = StylesSection::Other;
        }
        Event::Start(event) if section == StylesSection::NumberFormats && event.local_name().as_ref() == NUMBER_FORMAT => {
            if let Some((id, code)) = event.get_attribute_value("numFmtId")?.zip(event.get_attribute_value("formatCode")?) {
                custom_formats.insert(id.into_owned(), CellType::parse_custom_number_format(&code, is_1904));
            }
        }
        Event::Start(event) if section == StylesSection::CellFormats && event.local_name().as_ref() == CELL_FORMAT => {
            let id = event.get_attribute_value("numFmtId")?;
            format_ids.push(id.map_or_else(|| "0".to_owned(), |id| id.into_owned()));
        }
    });
    Ok(excel::load_number_formats(format_ids, custom_formats, is_1904))
}

/// Collects the text of a string element up to its end tag
///
/// Rich text runs are concatenated and phonetic guides (`<rPh>`) skipped.
/// With `is_text_content` set, text directly inside the element counts too,
/// as in `<v>`; otherwise only `<t>` children do, as in `<si>` and `<is>`.
fn read_text<R: BufRead>(
    reader: &mut XmlReader<R>,
    end: &[u8],
    is_text_content: bool,
) -> Result<String, TemplateFillError> {
    let mut in_phonetic = false;
    let mut in_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.local_name().as_ref() == end => break,
        Event::Start(event) if event.local_name().as_ref() == PHONETIC_RUN => in_phonetic = true,
        Event::End(event) if event.local_name().as_ref() == PHONETIC_RUN => in_phonetic = false,
        Event::Start(event) if !in_phonetic && event.local_name().as_ref() == TEXT => in_text = true,
        Event::End(event) if event.local_name().as_ref() == TEXT => in_text = is_text_content,
        Event::Text(event) if in_text => text.push_bytes_text(&event)?,
        Event::CData(event) if in_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if in_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}
