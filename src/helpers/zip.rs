//! ZIP archive helpers for reading parts of an Office Open XML package

use crate::error::ResultOptionChain;
use crate::error::TemplateFillError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

/// Helper trait for locating and reading package parts
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Resolves a part name to the entry name stored in the archive.
    /// Exact matches win; otherwise the lookup is case-insensitive and path separator agnostic.
    fn entry_name(&self, name: &str) -> Result<Option<String>, TemplateFillError>;

    /// Gets a file from the ZIP archive by part name
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, TemplateFillError>;

    /// Creates an XML reader for a file within the ZIP archive
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, TemplateFillError>;

    /// Reads a whole part into memory
    fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, TemplateFillError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn entry_name(&self, name: &str) -> Result<Option<String>, TemplateFillError> {
        let pattern = name.replace('\\', "/");
        let exact = self.file_names()
            .find(|file_name| *file_name == pattern)
            .map(str::to_owned);
        Ok(exact).ok_none_else(|| {
            Ok(self.file_names()
                .find(|file_name| pattern.eq_ignore_ascii_case(&file_name.replace('\\', "/")))
                .map(str::to_owned))
        })
    }

    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, TemplateFillError> {
        let path = self.entry_name(name)?;
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(Some(file)) => Ok(Some(file)),
            Ok(None) | Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, TemplateFillError> {
        let reader = self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }

    fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, TemplateFillError> {
        match self.file(name)? {
            Some(mut file) => {
                let mut bytes = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut bytes)?;
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }
}
