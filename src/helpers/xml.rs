//! XML helpers shared by the worksheet reader and the worksheet patcher.
//! Reading goes through [`XmlReader`]; writing helpers build SpreadsheetML elements
//! that keep the namespace prefix of the part being rewritten.

use crate::error::TemplateFillError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use quick_xml::Writer;
use std::borrow::Cow;
use std::io::BufRead;
use std::io::Write;
use std::str::FromStr;
use thiserror::Error;

/// Errors specific to XML parsing operations
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Parse entity '{0}' failed")]
    ParseEntityError(String),

    #[error("Parse attribute value '{0}' failed")]
    ParseAttributeValueError(String),
}

/// XML reader wrapper configured for pulling cell data out of package parts
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    /// Creates a reader that expands `<x/>` into start and end events,
    /// so cell handlers only need to match `Start`/`End`.
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);

        let buffer = Vec::with_capacity(1024);
        XmlReader { reader, buffer }
    }

    /// Reads the next XML event from the reader
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, TemplateFillError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(TemplateFillError::XmlError(error)),
        }
    }
}

/// Creates a raw reader for rewriting a part event by event. Empty elements stay
/// `Event::Empty` and text is not trimmed, so passthrough output matches the input.
pub(crate) fn passthrough_reader<R: BufRead>(buf_reader: R) -> Reader<R> {
    let mut reader = Reader::from_reader(buf_reader);
    let config = reader.config_mut();
    config.expand_empty_elements = false;
    config.trim_text(false);
    reader
}

/// Helper trait for XML attributes providing convenient value extraction and parsing
pub(crate) trait XmlAttributeHelper<'a> {
    /// Gets the unescaped attribute value as a string
    fn get_value(&self) -> Result<Cow<'a, str>, TemplateFillError>;

    /// Parses the attribute value to the specified type
    fn parse_value<T: FromStr>(&self) -> Result<T, TemplateFillError>;
}

impl<'a> XmlAttributeHelper<'a> for Attribute<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, TemplateFillError> {
        Ok(self.unescape_value()?)
    }

    fn parse_value<T: FromStr>(&self) -> Result<T, TemplateFillError> {
        self.get_value()?
            .parse()
            .map_err(|_| match str::from_utf8(&self.value) {
                Ok(value) => TemplateFillError::XmlHelperError(XmlError::ParseAttributeValueError(value.to_string())),
                Err(error) => TemplateFillError::StringEncodingError(error),
            })
    }
}

/// Helper trait for XML nodes providing attribute access methods
pub(crate) trait XmlNodeHelper<'a> {
    /// Gets an attribute value by name
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, TemplateFillError>;

    /// Parses an attribute value to the specified type
    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, TemplateFillError>;

    /// Namespace prefix of the element name (`x` for `<x:row>`), if any
    fn prefix(&self) -> Option<String>;
}

impl<'a> XmlNodeHelper<'a> for BytesStart<'a> {
    fn get_attribute_value(&'a self, name: &str) -> Result<Option<Cow<'a, str>>, TemplateFillError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.get_value())
            .transpose()
    }

    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, TemplateFillError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.parse_value())
            .transpose()
    }

    fn prefix(&self) -> Option<String> {
        self.name()
            .prefix()
            .and_then(|prefix| str::from_utf8(prefix.as_ref()).ok().map(str::to_owned))
    }
}

/// Helper trait for building text content from XML events
pub(crate) trait XmlTextContextHelper {
    /// Appends text content from BytesText event
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), TemplateFillError>;

    /// Appends text content from BytesRef event (handles entities and character references)
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), TemplateFillError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), TemplateFillError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), TemplateFillError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = if let Some(hex) = number.strip_prefix('x') {
                u32::from_str_radix(hex, 16)?
            } else {
                number.parse::<u32>()?
            };
            if let Some(character) = char::from_u32(code) {
                self.push(character);
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::ParseEntityError(raw.to_string()))?;
        }

        Ok(())
    }
}

/// Joins an optional namespace prefix and a local tag name
pub(crate) fn prefixed_tag(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{local}"),
        None => local.to_owned(),
    }
}

/// Writes `<tag>text</tag>`, marking the text with `xml:space="preserve"` when
/// surrounding whitespace would otherwise be dropped by consumers.
pub(crate) fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    text: &str,
) -> Result<(), TemplateFillError> {
    let mut start = BytesStart::new(tag);
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        start.push_attribute(("xml:space", "preserve"));
    }
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_text_with_entities() -> Result<(), TemplateFillError> {
        let mut reader = XmlReader::new(Cursor::new(b"<t>a &amp; b &#x41;&#66;</t>".to_vec()));
        let mut text = String::new();
        match_xml_events!(reader => {
            Event::Text(event) => text.push_bytes_text(&event)?,
            Event::GeneralRef(event) => text.push_bytes_ref(&event)?,
        });
        assert_eq!(text, "a & b AB");
        Ok(())
    }

    #[test]
    fn test_prefix_and_attributes() {
        let start = BytesStart::from_content(r#"x:row r="12" spans="1:3""#, 5);
        assert_eq!(start.prefix().as_deref(), Some("x"));
        assert_eq!(start.parse_attribute_value::<usize>("r").unwrap(), Some(12));
        assert!(start.parse_attribute_value::<usize>("spans").is_err());
        assert_eq!(start.get_attribute_value("missing").unwrap(), None);
    }

    #[test]
    fn test_write_text_element_preserves_space() {
        let mut writer = Writer::new(Vec::new());
        write_text_element(&mut writer, "t", " padded").unwrap();
        write_text_element(&mut writer, "t", "a<b").unwrap();
        let xml = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(xml, r#"<t xml:space="preserve"> padded</t><t>a&lt;b</t>"#);
    }

    #[test]
    fn test_prefixed_tag() {
        assert_eq!(prefixed_tag(Some("x"), "c"), "x:c");
        assert_eq!(prefixed_tag(None, "c"), "c");
    }
}
