use crate::error::TemplateFillError;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::path::Path;

/// Signature of an OLE2 compound file, the container used for encrypted OOXML packages
const COMPOUND_FILE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// A reader over a workbook that is either on disk or already in memory (an upload)
pub(crate) enum WorkbookReader {
    /// Local file reader
    Local(BufReader<File>),
    /// In-memory buffer
    Memory(Cursor<Vec<u8>>),
}

impl WorkbookReader {
    /// Opens a local workbook file
    pub(crate) fn open<P: AsRef<Path>>(path: P) -> Result<WorkbookReader, TemplateFillError> {
        let file = File::open(path)?;
        Ok(WorkbookReader::Local(BufReader::new(file)))
    }

    /// Wraps uploaded workbook bytes
    pub(crate) fn from_bytes(bytes: Vec<u8>) -> WorkbookReader {
        WorkbookReader::Memory(Cursor::new(bytes))
    }

    /// Checks whether the content is an OLE2 compound file rather than a ZIP package.
    /// Excel stores password protected xlsx files that way. The stream position is restored.
    pub(crate) fn is_compound_file(&mut self) -> Result<bool, TemplateFillError> {
        let position = self.stream_position()?;
        let mut signature = [0u8; 8];
        let matched = match self.read_exact(&mut signature) {
            Ok(()) => signature == COMPOUND_FILE_SIGNATURE,
            Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => false,
            Err(error) => Err(error)?,
        };
        self.seek(SeekFrom::Start(position))?;
        Ok(matched)
    }
}

impl Read for WorkbookReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            WorkbookReader::Local(reader) => reader.read(buf),
            WorkbookReader::Memory(reader) => reader.read(buf),
        }
    }
}

impl Seek for WorkbookReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            WorkbookReader::Local(reader) => reader.seek(pos),
            WorkbookReader::Memory(reader) => reader.seek(pos),
        }
    }
}
