//! Office Open XML package helpers shared by the reader and the serializer
use crate::error::TemplateFillError;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use zip::ZipArchive;

/// Local name of the entries of a `.rels` part
const RELATIONSHIP: &[u8] = b"Relationship";

/// Relationship type suffix of worksheet parts
pub(crate) const REL_TYPE_WORKSHEET: &str = "/worksheet";

/// Relationship type suffix of the calculation chain part
pub(crate) const REL_TYPE_CALC_CHAIN: &str = "/calcChain";

/// Maps relationship IDs to package part names, keeping only relationships
/// whose `Type` ends with `kind` (e.g. [`REL_TYPE_WORKSHEET`]).
/// A missing `.rels` part is an error.
pub(super) fn load_relationships<RS: Read + Seek>(
    zip: &mut ZipArchive<RS>,
    path: &str,
    kind: &str,
) -> Result<HashMap<String, String>, TemplateFillError> {
    let Some(mut reader) = zip.xml_reader(path)? else {
        return Err(SpreadsheetError::FileError(path.to_owned()).into());
    };
    let mut parts = HashMap::new();
    match_xml_events!(reader => {
        Event::Start(event) if event.local_name().as_ref() == RELATIONSHIP => {
            let matches_kind = event.get_attribute_value("Type")?.is_some_and(|it| it.ends_with(kind));
            if matches_kind {
                let id = event.get_attribute_value("Id")?;
                let target = event.get_attribute_value("Target")?;
                if let Some((id, target)) = id.zip(target) {
                    parts.insert(id.into_owned(), to_zip_path(target));
                }
            }
        }
    });
    Ok(parts)
}

/// Resolves each `cellXfs` entry's number format to a storage kind.
/// Custom formats take precedence over built-in IDs; anything else is a plain number.
pub(super) fn load_number_formats(
    format_ids: Vec<String>,
    custom_formats: HashMap<String, CellType>,
    is_1904: bool,
) -> Vec<CellType> {
    format_ids
        .iter()
        .map(|id| match custom_formats.get(id) {
            Some(kind) => *kind,
            None => CellType::parse_builtin_number_format_id(id, is_1904).unwrap_or(CellType::Number),
        })
        .collect()
}

/// Entry name of a workbook relationship target. Targets are relative to `xl/`
/// unless they start with `/`.
pub(crate) fn to_zip_path(target: Cow<'_, str>) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_owned(),
        None if target.starts_with("xl/") => target.into_owned(),
        None => format!("xl/{target}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_zip_path() {
        assert_eq!(to_zip_path(Cow::Borrowed("worksheets/sheet1.xml")), "xl/worksheets/sheet1.xml");
        assert_eq!(to_zip_path(Cow::Borrowed("/xl/worksheets/sheet2.xml")), "xl/worksheets/sheet2.xml");
        assert_eq!(to_zip_path(Cow::Borrowed("xl/worksheets/sheet3.xml")), "xl/worksheets/sheet3.xml");
    }

    #[test]
    fn test_load_number_formats() {
        let mut custom = HashMap::new();
        custom.insert("164".to_owned(), CellType::NumberDate1900);
        let formats = load_number_formats(
            vec!["0".to_owned(), "14".to_owned(), "164".to_owned(), "4".to_owned()],
            custom,
            false,
        );
        assert_eq!(
            formats,
            vec![CellType::Number, CellType::NumberDate1900, CellType::NumberDate1900, CellType::Number]
        );
    }
}
