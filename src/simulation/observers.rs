//! Observers that record integration output
//!
//! - `Recorder`: keeps every observed (t, state) pair in memory
//! - `StateCsvObserver`: full spacecraft state, optional column groups
//! - `BhObserver`: B-H loop samples `time,H_Am,M_Am,B_T`
//! - `OrbitObserver`: `time,r_x,r_y,r_z,r_mag,v_mag`
//! - `AttitudeObserver`: quaternion, Euler angles, rates and nadir error
//!
//! CSV observers never panic from `observe`: the first write error is kept
//! and returned by `finish`, and later rows are dropped.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::simulation::constants::{RAD_TO_DEG, VACUUM_PERMEABILITY};
use crate::simulation::dynamics::SpacecraftDynamics;
use crate::simulation::error::SimulationError;
use crate::simulation::integrator::Observer;
use crate::simulation::states::SystemState;
use crate::simulation::verify::AppliedField;

/// Open `path` for writing, creating missing parent directories.
pub fn create_output_file(path: &Path) -> Result<File, SimulationError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(File::create(path)?)
}

/// Keeps every observation.
#[derive(Debug, Clone)]
pub struct Recorder<S> {
    pub samples: Vec<(f64, S)>,
}

impl<S> Default for Recorder<S> {
    fn default() -> Self {
        Self { samples: Vec::new() }
    }
}

impl<S> Recorder<S> {
    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|(t, _)| *t)
    }

    pub fn last(&self) -> Option<&(f64, S)> {
        self.samples.last()
    }
}

impl<S: Clone> Observer<S> for Recorder<S> {
    fn observe(&mut self, state: &S, t: f64) {
        self.samples.push((t, state.clone()));
    }
}

/// CSV writer that latches the first error.
struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    error: Option<csv::Error>,
    rows: u64,
}

impl<W: Write> CsvSink<W> {
    fn new<I, H>(inner: W, header: I) -> Result<Self, SimulationError>
    where
        I: IntoIterator<Item = H>,
        H: AsRef<[u8]>,
    {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(header)?;
        Ok(Self {
            writer,
            error: None,
            rows: 0,
        })
    }

    fn push(&mut self, values: &[f64]) {
        if self.error.is_some() {
            return;
        }
        match self.writer.write_record(values.iter().map(|v| v.to_string())) {
            Ok(()) => self.rows += 1,
            Err(e) => self.error = Some(e),
        }
    }

    fn finish(mut self) -> Result<u64, SimulationError> {
        if let Some(e) = self.error.take() {
            return Err(e.into());
        }
        self.writer.flush()?;
        Ok(self.rows)
    }
}

/// Column groups of [`StateCsvObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateColumns {
    pub elements: bool,   // per-component values and rod magnetizations
    pub magnitudes: bool, // |w|, |r|, |v|
}

impl Default for StateColumns {
    fn default() -> Self {
        Self {
            elements: true,
            magnitudes: true,
        }
    }
}

/// `time,q_w,q_x,q_y,q_z,w_x,w_y,w_z,r_x,r_y,r_z,v_x,v_y,v_z,M_1..M_n,w_mag,r_mag,v_mag`
pub struct StateCsvObserver<W: Write> {
    sink: CsvSink<W>,
    num_rods: usize,
    columns: StateColumns,
    row: Vec<f64>,
}

impl StateCsvObserver<File> {
    pub fn create(path: impl AsRef<Path>, num_rods: usize, columns: StateColumns) -> Result<Self, SimulationError> {
        Self::from_writer(create_output_file(path.as_ref())?, num_rods, columns)
    }
}

impl<W: Write> StateCsvObserver<W> {
    pub fn from_writer(inner: W, num_rods: usize, columns: StateColumns) -> Result<Self, SimulationError> {
        let header = Self::header(num_rods, columns);
        Ok(Self {
            sink: CsvSink::new(inner, &header)?,
            num_rods,
            columns,
            row: Vec::with_capacity(header.len()),
        })
    }

    pub fn header(num_rods: usize, columns: StateColumns) -> Vec<String> {
        let mut header = vec!["time".to_string()];
        if columns.elements {
            for name in [
                "q_w", "q_x", "q_y", "q_z", "w_x", "w_y", "w_z", "r_x", "r_y", "r_z", "v_x", "v_y", "v_z",
            ] {
                header.push(name.to_string());
            }
            header.extend((1..=num_rods).map(|i| format!("M_{}", i)));
        }
        if columns.magnitudes {
            header.extend(["w_mag", "r_mag", "v_mag"].map(String::from));
        }
        header
    }

    /// Flush and return the number of data rows written.
    pub fn finish(self) -> Result<u64, SimulationError> {
        self.sink.finish()
    }
}

impl<W: Write> Observer<SystemState> for StateCsvObserver<W> {
    fn observe(&mut self, state: &SystemState, t: f64) {
        self.row.clear();
        self.row.push(t);
        if self.columns.elements {
            let q = &state.attitude;
            self.row.extend([q.w, q.i, q.j, q.k]);
            self.row.extend(state.angular_velocity.iter());
            self.row.extend(state.position.iter());
            self.row.extend(state.velocity.iter());
            // pad or truncate so the row always matches the header
            self.row.extend(
                (0..self.num_rods).map(|i| state.rod_magnetizations.get(i).copied().unwrap_or(f64::NAN)),
            );
        }
        if self.columns.magnitudes {
            self.row.extend([
                state.angular_velocity.norm(),
                state.position.norm(),
                state.velocity.norm(),
            ]);
        }
        self.sink.push(&self.row);
    }
}

/// `time,H_Am,M_Am,B_T` for a B-H loop driven by `field`.
pub struct BhObserver<W: Write> {
    sink: CsvSink<W>,
    field: AppliedField,
}

impl BhObserver<File> {
    pub fn create(path: impl AsRef<Path>, field: AppliedField) -> Result<Self, SimulationError> {
        Self::from_writer(create_output_file(path.as_ref())?, field)
    }
}

impl<W: Write> BhObserver<W> {
    pub fn from_writer(inner: W, field: AppliedField) -> Result<Self, SimulationError> {
        Ok(Self {
            sink: CsvSink::new(inner, ["time", "H_Am", "M_Am", "B_T"])?,
            field,
        })
    }

    pub fn finish(self) -> Result<u64, SimulationError> {
        self.sink.finish()
    }
}

impl<W: Write> Observer<f64> for BhObserver<W> {
    fn observe(&mut self, m: &f64, t: f64) {
        let h = self.field.field(t);
        let b = VACUUM_PERMEABILITY * (h + m);
        self.sink.push(&[t, h, *m, b]);
    }
}

/// `time,r_x,r_y,r_z,r_mag,v_mag`
pub struct OrbitObserver<W: Write> {
    sink: CsvSink<W>,
}

impl OrbitObserver<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SimulationError> {
        Self::from_writer(create_output_file(path.as_ref())?)
    }
}

impl<W: Write> OrbitObserver<W> {
    pub fn from_writer(inner: W) -> Result<Self, SimulationError> {
        Ok(Self {
            sink: CsvSink::new(inner, ["time", "r_x", "r_y", "r_z", "r_mag", "v_mag"])?,
        })
    }

    pub fn finish(self) -> Result<u64, SimulationError> {
        self.sink.finish()
    }
}

impl<W: Write> Observer<SystemState> for OrbitObserver<W> {
    fn observe(&mut self, state: &SystemState, t: f64) {
        let r = &state.position;
        self.sink
            .push(&[t, r.x, r.y, r.z, r.norm(), state.velocity.norm()]);
    }
}

/// Quaternion, roll/pitch/yaw [deg], body rates and nadir pointing error.
pub struct AttitudeObserver<W: Write> {
    sink: CsvSink<W>,
}

impl AttitudeObserver<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SimulationError> {
        Self::from_writer(create_output_file(path.as_ref())?)
    }
}

impl<W: Write> AttitudeObserver<W> {
    pub fn from_writer(inner: W) -> Result<Self, SimulationError> {
        let header = [
            "time",
            "q_w",
            "q_x",
            "q_y",
            "q_z",
            "roll_deg",
            "pitch_deg",
            "yaw_deg",
            "omega_x",
            "omega_y",
            "omega_z",
            "nadir_error_deg",
        ];
        Ok(Self {
            sink: CsvSink::new(inner, header)?,
        })
    }

    pub fn finish(self) -> Result<u64, SimulationError> {
        self.sink.finish()
    }
}

/// Angle [deg] between the body +Z axis and the nadir direction; NaN at the
/// origin.
pub fn nadir_error_deg(state: &SystemState) -> f64 {
    let r_norm = state.position.norm();
    if r_norm == 0.0 {
        return f64::NAN;
    }
    let nadir_eci = -state.position / r_norm;
    let nadir_body = SpacecraftDynamics::eci_to_body(&state.attitude) * nadir_eci;
    nadir_body.z.clamp(-1.0, 1.0).acos() * RAD_TO_DEG
}

impl<W: Write> Observer<SystemState> for AttitudeObserver<W> {
    fn observe(&mut self, state: &SystemState, t: f64) {
        let q = state.unit_attitude();
        let (roll, pitch, yaw) = q.euler_angles();
        let w = &state.angular_velocity;
        self.sink.push(&[
            t,
            q.w,
            q.i,
            q.j,
            q.k,
            roll * RAD_TO_DEG,
            pitch * RAD_TO_DEG,
            yaw * RAD_TO_DEG,
            w.x,
            w.y,
            w.z,
            nadir_error_deg(state),
        ]);
    }
}
