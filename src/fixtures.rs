//! In-memory `.xlsx` packages for tests.

use quick_xml::escape::escape;
use std::fmt::Write as _;
use std::io::Cursor;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Style index of the date format (`numFmtId="14"`) in the generated styles part
const DATE_STYLE: usize = 1;

/// Cell content of a fixture grid
#[derive(Clone, Copy, Debug)]
pub(crate) enum FixtureCell<'a> {
    Text(&'a str),
    Number(&'a str),
    Bool(bool),
    Date(f64),
    Error(&'a str),
    Empty,
}

/// Builds a minimal but valid workbook package
#[derive(Default)]
pub(crate) struct WorkbookBuilder {
    /// (name, worksheet XML) in workbook order
    sheets: Vec<(String, String)>,
    shared_strings: Vec<String>,
    date_1904: bool,
    calc_chain: bool,
}

impl WorkbookBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a sheet from a grid of rows, starting at A1
    pub(crate) fn sheet(mut self, name: &str, rows: Vec<Vec<FixtureCell>>) -> Self {
        let xml = self.grid_xml(&rows);
        self.sheets.push((name.to_owned(), xml));
        self
    }

    /// Adds a sheet with hand-written worksheet XML
    pub(crate) fn raw_sheet(mut self, name: &str, xml: &str) -> Self {
        self.sheets.push((name.to_owned(), xml.to_owned()));
        self
    }

    pub(crate) fn date_1904(mut self) -> Self {
        self.date_1904 = true;
        self
    }

    /// Adds `xl/calcChain.xml` pointing at A1 of the first sheet
    pub(crate) fn calc_chain(mut self) -> Self {
        self.calc_chain = true;
        self
    }

    fn shared_string(&mut self, text: &str) -> usize {
        match self.shared_strings.iter().position(|it| it == text) {
            Some(index) => index,
            None => {
                self.shared_strings.push(text.to_owned());
                self.shared_strings.len() - 1
            }
        }
    }

    fn grid_xml(&mut self, rows: &[Vec<FixtureCell>]) -> String {
        let mut data = String::new();
        let mut last_col = 0usize;
        for (row, cells) in rows.iter().enumerate() {
            let mut row_xml = String::new();
            for (col, cell) in cells.iter().enumerate() {
                let reference = crate::spreadsheet::reference::index_to_reference(row, col);
                let cell_xml = match *cell {
                    FixtureCell::Text(text) => {
                        let index = self.shared_string(text);
                        format!(r#"<c r="{reference}" t="s"><v>{index}</v></c>"#)
                    }
                    FixtureCell::Number(number) => format!(r#"<c r="{reference}"><v>{number}</v></c>"#),
                    FixtureCell::Bool(flag) => format!(r#"<c r="{reference}" t="b"><v>{}</v></c>"#, u8::from(flag)),
                    FixtureCell::Date(serial) => {
                        format!(r#"<c r="{reference}" s="{DATE_STYLE}"><v>{serial}</v></c>"#)
                    }
                    FixtureCell::Error(error) => format!(r#"<c r="{reference}" t="e"><v>{}</v></c>"#, escape(error)),
                    FixtureCell::Empty => continue,
                };
                last_col = last_col.max(col);
                row_xml.push_str(&cell_xml);
            }
            if !row_xml.is_empty() {
                let _ = write!(data, r#"<row r="{}">{row_xml}</row>"#, row + 1);
            }
        }
        if data.is_empty() {
            return format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="{MAIN_NS}"><dimension ref="A1"/><sheetData/></worksheet>"#);
        }
        let dimension = format!(
            "A1:{}",
            crate::spreadsheet::reference::index_to_reference(rows.len().saturating_sub(1), last_col)
        );
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="{MAIN_NS}"><dimension ref="{dimension}"/><sheetData>{data}</sheetData></worksheet>"#
        )
    }

    /// Serializes the package
    pub(crate) fn build(self) -> Vec<u8> {
        let sheet_count = self.sheets.len();
        let mut content_types = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        content_types.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
        content_types.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
        content_types.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
        content_types.push_str(r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#);
        for index in 1..=sheet_count {
            let _ = write!(
                content_types,
                r#"<Override PartName="/xl/worksheets/sheet{index}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            );
        }
        content_types.push_str(r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#);
        content_types.push_str(r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#);
        if self.calc_chain {
            content_types.push_str(r#"<Override PartName="/xl/calcChain.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.calcChain+xml"/>"#);
        }
        content_types.push_str("</Types>");

        let root_rels = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PKG_REL_NS}"><Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
        );

        let mut workbook = format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}">"#);
        if self.date_1904 {
            workbook.push_str(r#"<workbookPr date1904="1"/>"#);
        }
        workbook.push_str("<sheets>");
        let mut workbook_rels = format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PKG_REL_NS}">"#);
        for (index, (name, _)) in self.sheets.iter().enumerate() {
            let id = index + 1;
            let _ = write!(workbook, r#"<sheet name="{}" sheetId="{id}" r:id="rId{id}"/>"#, escape(name.as_str()));
            let _ = write!(
                workbook_rels,
                r#"<Relationship Id="rId{id}" Type="{REL_NS}/worksheet" Target="worksheets/sheet{id}.xml"/>"#
            );
        }
        workbook.push_str("</sheets></workbook>");
        let _ = write!(
            workbook_rels,
            r#"<Relationship Id="rId{}" Type="{REL_NS}/styles" Target="styles.xml"/><Relationship Id="rId{}" Type="{REL_NS}/sharedStrings" Target="sharedStrings.xml"/>"#,
            sheet_count + 1,
            sheet_count + 2
        );
        if self.calc_chain {
            let _ = write!(
                workbook_rels,
                r#"<Relationship Id="rId{}" Type="{REL_NS}/calcChain" Target="calcChain.xml"/>"#,
                sheet_count + 3
            );
        }
        workbook_rels.push_str("</Relationships>");

        let styles = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><styleSheet xmlns="{MAIN_NS}"><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#
        );

        let mut shared_strings = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="{MAIN_NS}" count="{0}" uniqueCount="{0}">"#,
            self.shared_strings.len()
        );
        for text in &self.shared_strings {
            let space = if text.trim() != text { r#" xml:space="preserve""# } else { "" };
            let _ = write!(shared_strings, "<si><t{space}>{}</t></si>", escape(text.as_str()));
        }
        shared_strings.push_str("</sst>");

        let mut entries: Vec<(String, String)> = vec![
            ("[Content_Types].xml".to_owned(), content_types),
            ("_rels/.rels".to_owned(), root_rels),
            ("xl/workbook.xml".to_owned(), workbook),
            ("xl/_rels/workbook.xml.rels".to_owned(), workbook_rels),
            ("xl/styles.xml".to_owned(), styles),
            ("xl/sharedStrings.xml".to_owned(), shared_strings),
        ];
        for (index, (_, xml)) in self.sheets.into_iter().enumerate() {
            entries.push((format!("xl/worksheets/sheet{}.xml", index + 1), xml));
        }
        if self.calc_chain {
            entries.push((
                "xl/calcChain.xml".to_owned(),
                format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><calcChain xmlns="{MAIN_NS}"><c r="A1" i="1"/></calcChain>"#),
            ));
        }

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}
