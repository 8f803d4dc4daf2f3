//! Package serializer: copies an Office Open XML package entry by entry,
//! replacing the patched worksheet part.
//!
//! Untouched entries are copied raw (no recompression), and the rewritten part
//! inherits the timestamp of the entry it replaces, so the output depends only
//! on the input package and the patches. The styles part is rewritten only
//! when date cells needed a style it does not have yet.

use crate::error::TemplateFillError;
use crate::helpers::xml::passthrough_reader;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel::REL_TYPE_CALC_CHAIN;
use crate::spreadsheet::patch::patch_worksheet;
use crate::spreadsheet::patch::CellPatch;
use crate::spreadsheet::patch::PatchError;
use crate::spreadsheet::patch::PatchSummary;
use crate::spreadsheet::styles::DateStyles;
use crate::spreadsheet::styles::STYLES_PART;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Writer;
use std::collections::HashMap;
use std::collections::HashSet;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const CALC_CHAIN_PART: &str = "xl/calcChain.xml";

/// Writes a copy of the package with `patches` applied to `worksheet_part`
///
/// `number_formats` gives the storage kind of each `cellXfs` style, so date
/// values can be written under a date style. When overwritten cells held
/// formulas, the calculation chain is dropped together with its relationship
/// and content type, so Excel rebuilds it instead of reporting a corrupt file.
pub(crate) fn write_package<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    worksheet_part: &str,
    patches: &[CellPatch],
    number_formats: &[CellType],
) -> Result<(Vec<u8>, PatchSummary), TemplateFillError> {
    let entry = zip
        .entry_name(worksheet_part)?
        .ok_or_else(|| PatchError::MissingWorksheetPartError(worksheet_part.to_owned()))?;

    let styles_part = match zip.entry_name(STYLES_PART)? {
        Some(name) => zip.read_bytes(&name)?.map(|bytes| (name, bytes)),
        None => None,
    };
    let mut styles = match &styles_part {
        Some((_, bytes)) => DateStyles::from_styles_part(bytes, number_formats)?,
        None => DateStyles::default(),
    };

    let mut worksheet = Vec::new();
    let summary = {
        let file = zip.by_name(&entry)?;
        patch_worksheet(BufReader::new(file), &mut worksheet, &entry, patches, &mut styles)?
    };

    let mut rewritten: HashMap<String, Vec<u8>> = HashMap::new();
    let mut dropped: HashSet<String> = HashSet::new();
    rewritten.insert(entry, worksheet);
    if let Some((name, bytes)) = styles_part.filter(|_| styles.has_additions()) {
        log::debug!("Adding date style(s) to '{}'", name);
        rewritten.insert(name, styles.rewrite(&bytes)?);
    }

    if summary.formulas_removed > 0 {
        if let Some(calc_chain) = zip.entry_name(CALC_CHAIN_PART)? {
            log::info!("Dropping '{}' after overwriting {} formula cell(s)", calc_chain, summary.formulas_removed);
            dropped.insert(calc_chain);
            if let Some(name) = zip.entry_name(CONTENT_TYPES_PART)? {
                if let Some(bytes) = zip.read_bytes(&name)? {
                    let filtered = remove_elements(&bytes, b"Override", |e| {
                        Ok(e.get_attribute_value("PartName")?
                            .is_some_and(|part| part.trim_start_matches('/').eq_ignore_ascii_case(CALC_CHAIN_PART)))
                    })?;
                    rewritten.insert(name, filtered);
                }
            }
            if let Some(name) = zip.entry_name(WORKBOOK_RELS_PART)? {
                if let Some(bytes) = zip.read_bytes(&name)? {
                    let filtered = remove_elements(&bytes, b"Relationship", |e| {
                        Ok(e.get_attribute_value("Type")?.is_some_and(|kind| kind.ends_with(REL_TYPE_CALC_CHAIN)))
                    })?;
                    rewritten.insert(name, filtered);
                }
            }
        }
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for index in 0..zip.len() {
        let file = zip.by_index_raw(index)?;
        let name = file.name().to_owned();
        if dropped.contains(&name) {
            continue;
        }
        match rewritten.get(&name) {
            Some(bytes) => {
                let options = SimpleFileOptions::default()
                    .compression_method(CompressionMethod::Deflated)
                    .last_modified_time(file.last_modified().unwrap_or_default());
                writer.start_file(name, options)?;
                writer.write_all(bytes)?;
            }
            None => writer.raw_copy_file(file)?,
        }
    }
    let cursor = writer.finish()?;
    Ok((cursor.into_inner(), summary))
}

/// Copies an XML part without the `local` elements accepted by `matches`
fn remove_elements<F>(bytes: &[u8], local: &[u8], matches: F) -> Result<Vec<u8>, TemplateFillError>
where
    F: Fn(&BytesStart<'_>) -> Result<bool, TemplateFillError>,
{
    let mut reader = passthrough_reader(bytes);
    let mut writer = Writer::new(Vec::with_capacity(bytes.len()));
    let mut buffer = Vec::new();
    loop {
        match reader.read_event_into(&mut buffer)? {
            Event::Eof => break,
            Event::Empty(ref e) if e.local_name().as_ref() == local && matches(e)? => (),
            Event::Start(ref e) if e.local_name().as_ref() == local && matches(e)? => {
                let end = e.name().as_ref().to_vec();
                reader.read_to_end_into(quick_xml::name::QName(&end), &mut Vec::new())?;
            }
            event => writer.write_event(event)?,
        }
        buffer.clear();
    }
    Ok(writer.into_inner())
}
