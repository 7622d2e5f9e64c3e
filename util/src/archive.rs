//! Struct archiving functionality
//!
//! Records are written as rows of a CSV file with a header line. Archived
//! records must be flat structs, nested structs are rejected by the CSV
//! writer.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::path::Path;
use std::fs::{File, OpenOptions};
use csv::{ReaderBuilder, Writer, WriterBuilder};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
#[derive(Default)]
pub struct Archiver {
    writer: Option<Writer<File>>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while writing or reading archives.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot open the archive file: {0}")]
    FileError(std::io::Error),

    #[error("Cannot serialise or deserialise a record: {0}")]
    CsvError(csv::Error),

    #[error("The archiver has not been initialised with a file")]
    NotInitialised,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver writing to the given file path.
    ///
    /// Any missing parent directories are created and an existing file is
    /// truncated.
    pub fn from_file_path<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(ArchiveError::FileError)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(path)
            .map_err(ArchiveError::FileError)?;

        let w = WriterBuilder::new()
            .has_headers(true)
            .from_writer(file);

        Ok(Self {
            writer: Some(w)
        })
    }

    /// Serialise a record into the archive.
    pub fn serialise<T: Serialize>(&mut self, record: T) -> Result<(), ArchiveError> {
        match self.writer {
            Some(ref mut w) => {
                w.serialize(record).map_err(ArchiveError::CsvError)?;
                w.flush().map_err(ArchiveError::FileError)
            },
            None => Err(ArchiveError::NotInitialised)
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Read every record back out of an archive file written by an [`Archiver`].
pub fn read_records<T, P>(path: P) -> Result<Vec<T>, ArchiveError>
where
    T: DeserializeOwned,
    P: AsRef<Path>
{
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(ArchiveError::CsvError)?;

    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(ArchiveError::CsvError)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        time_s: f64,
        value: Option<f64>,
        label: String,
    }

    #[test]
    fn test_archive_write_then_read() {
        let path = std::env::temp_dir()
            .join(format!("util_archive_test_{}", std::process::id()))
            .join("rows.csv");

        let rows = vec![
            Row { time_s: 0.0, value: Some(1.5), label: String::from("None") },
            Row { time_s: 0.02, value: None, label: String::from("dynamic-forward") },
        ];

        let mut arch = Archiver::from_file_path(&path).unwrap();
        for r in rows.iter() {
            arch.serialise(r).unwrap();
        }

        let read: Vec<Row> = read_records(&path).unwrap();
        assert_eq!(read, rows);
    }

    #[test]
    fn test_uninitialised_archiver() {
        let mut arch = Archiver::default();
        assert!(matches!(arch.serialise(1u8), Err(ArchiveError::NotInitialised)));
    }
}
