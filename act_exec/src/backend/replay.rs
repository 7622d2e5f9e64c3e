//! Replay backend
//!
//! Plays back snapshots recorded by an [`ArchiveSink`](crate::telemetry::ArchiveSink).
//! Commands are accepted so the rest of the software runs unchanged, but
//! nothing is ever actuated.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::path::Path;

use log::{debug, info, warn};

use super::{ActBackend, BackendError, Misuse, RobotMode};
use crate::motor_data::MotorData;
use crate::snapshot::Snapshot;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct ReplayBackend {
    records: Vec<Snapshot>,

    /// Index of the next record to play.
    next: usize,

    bound: bool,

    num_followers: usize,

    /// Number of commands received and dropped.
    ignored_commands: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ReplayBackend {
    /// Create a backend replaying the given records, oldest first.
    pub fn new(records: Vec<Snapshot>) -> Self {
        Self {
            records,
            next: 0,
            bound: false,
            num_followers: 0,
            ignored_commands: 0,
        }
    }

    /// Load the records from a snapshot archive.
    pub fn from_archive<P: AsRef<Path>>(path: P) -> Result<Self, BackendError> {
        let records = load_archive(path)?;
        Ok(Self::new(records))
    }

    /// Number of commands received, none of which were actuated.
    pub fn ignored_commands(&self) -> usize {
        self.ignored_commands
    }

    /// Whether every record has been played.
    pub fn is_exhausted(&self) -> bool {
        self.next >= self.records.len()
    }

    /// The most recently played record, if any.
    fn current(&self) -> Option<&Snapshot> {
        match self.next {
            0 => None,
            n => self.records.get(n - 1)
        }
    }

    fn check_bound(&self) -> Result<(), BackendError> {
        if self.bound {
            Ok(())
        }
        else {
            Err(BackendError::Misuse(Misuse::NotBound))
        }
    }

    fn ignore(&mut self, what: &str) -> Result<(), BackendError> {
        self.check_bound()?;
        self.ignored_commands += 1;
        debug!("Replay backend ignoring {} command", what);
        Ok(())
    }
}

/// Read the snapshots stored in an archive.
pub fn load_archive<P: AsRef<Path>>(path: P) -> Result<Vec<Snapshot>, BackendError> {
    let records: Vec<Snapshot> = util::archive::read_records(path.as_ref())
        .map_err(BackendError::ReplayLoad)?;

    info!("Loaded {} records to replay from {:?}", records.len(), path.as_ref());

    Ok(records)
}

impl ActBackend for ReplayBackend {
    fn mode(&self) -> RobotMode {
        RobotMode::Replay
    }

    fn initialize(
        &mut self,
        leading: &MotorData,
        following: &[MotorData]
    ) -> Result<(), BackendError> {
        if self.bound {
            return Err(BackendError::Misuse(Misuse::DoubleInit));
        }

        if self.records.is_empty() {
            warn!("Replay backend for motor {} has no records to play", leading.id());
        }

        self.bound = true;
        self.num_followers = following.len();

        Ok(())
    }

    fn update_inputs(&mut self, snapshot: &mut Snapshot) -> Result<(), BackendError> {
        self.check_bound()?;

        if let Some(record) = self.records.get(self.next) {
            // Only the backend's fields are replayed, the subsystem owns the
            // rest.
            snapshot.position_rot = record.position_rot;
            snapshot.velocity_rps = record.velocity_rps;
            snapshot.goal_position_rot = record.goal_position_rot;
            snapshot.voltage_v = record.voltage_v;

            self.next += 1;
            if self.is_exhausted() {
                info!("Replay finished after {} records, holding the last", self.next);
            }
        }

        Ok(())
    }

    fn set_goal_position(&mut self, _position_rot: f64) -> Result<(), BackendError> {
        self.ignore("goal position")
    }

    fn set_voltage(&mut self, _volts: f64) -> Result<(), BackendError> {
        self.ignore("voltage")
    }

    /// Position of the last played record. Before the first cycle this is the
    /// position the replay starts from, the first record.
    fn position_rot(&mut self) -> Result<f64, BackendError> {
        self.check_bound()?;
        self.current()
            .or_else(|| self.records.first())
            .map(|r| r.position_rot)
            .ok_or(BackendError::NoReplayData)
    }

    fn num_followers(&self) -> usize {
        self.num_followers
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
