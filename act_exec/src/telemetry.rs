//! # Telemetry
//!
//! Subsystems publish their [`Snapshot`] every cycle to a [`TelemetrySink`].
//! The [`ArchiveSink`] stores each subsystem's snapshots as a CSV archive in
//! the session directory, which can later be fed to the replay backend.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::path::PathBuf;

use log::debug;
use util::archive::{ArchiveError, Archiver};
use util::session::Session;

use crate::snapshot::Snapshot;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// File name of the snapshot archive inside each subsystem's directory.
pub const SNAPSHOT_ARCHIVE_NAME: &str = "snapshot.csv";

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Destination for per-cycle snapshots.
pub trait TelemetrySink {
    /// Publish the snapshot of the subsystem with the given name.
    fn publish(&mut self, name: &str, snapshot: &Snapshot) -> Result<(), TelemetryError>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Writes snapshots to `{root}/{name}/snapshot.csv`.
pub struct ArchiveSink {
    root: PathBuf,

    archivers: HashMap<String, Archiver>,
}

/// Sink that drops every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Could not archive the snapshot of {0}: {1}")]
    ArchiveError(String, ArchiveError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArchiveSink {
    /// Create a sink archiving into the session's archive root.
    pub fn new(session: &Session) -> Self {
        Self::in_dir(session.arch_root.clone())
    }

    /// Create a sink archiving into the given directory.
    pub fn in_dir<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            archivers: HashMap::new(),
        }
    }

    /// Path of the archive for the given subsystem name.
    pub fn archive_path(&self, name: &str) -> PathBuf {
        self.root.join(name).join(SNAPSHOT_ARCHIVE_NAME)
    }
}

impl TelemetrySink for ArchiveSink {
    fn publish(&mut self, name: &str, snapshot: &Snapshot) -> Result<(), TelemetryError> {
        if !self.archivers.contains_key(name) {
            let path = self.archive_path(name);
            debug!("Creating snapshot archive for {} at {:?}", name, path);

            let arch = Archiver::from_file_path(path)
                .map_err(|e| TelemetryError::ArchiveError(name.to_string(), e))?;
            self.archivers.insert(name.to_string(), arch);
        }

        match self.archivers.get_mut(name) {
            Some(arch) => arch
                .serialise(snapshot)
                .map_err(|e| TelemetryError::ArchiveError(name.to_string(), e)),
            None => Ok(())
        }
    }
}

impl TelemetrySink for NullSink {
    fn publish(&mut self, _name: &str, _snapshot: &Snapshot) -> Result<(), TelemetryError> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_archive_sink_round_trip() {
        let root = std::env::temp_dir()
            .join(format!("act_telemetry_test_{}", std::process::id()));
        let mut sink = ArchiveSink::in_dir(&root);

        let mut snap = Snapshot::default();
        sink.publish("elevator", &snap).unwrap();

        snap.time_s = 0.02;
        snap.position_rot = 0.5;
        snap.voltage_v = Some(1.0);
        snap.sysid_state = String::from("quasistatic-forward");
        sink.publish("elevator", &snap).unwrap();

        let records: Vec<Snapshot> =
            util::archive::read_records(sink.archive_path("elevator")).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0], Snapshot::default());
        assert_eq!(records[1], snap);
    }
}
