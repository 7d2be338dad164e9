use crate::error::SinkError;
use crate::types::{ImuReading, MetaRecord, ThermalFrame};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// Decimal places for thermal pixels.
pub const THERMAL_DECIMALS: usize = 2;
/// Decimal places for timestamps and physical units.
pub const UNIT_DECIMALS: usize = 6;

/// Stable identity of one output file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKey {
    Imu,
    Pir,
    Distance,
    Main1,
    Main2,
    Cam3,
    Cam4,
}

impl SinkKey {
    pub const ALL: [SinkKey; 7] = [
        SinkKey::Imu,
        SinkKey::Pir,
        SinkKey::Distance,
        SinkKey::Main1,
        SinkKey::Main2,
        SinkKey::Cam3,
        SinkKey::Cam4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKey::Imu => "imu",
            SinkKey::Pir => "pir",
            SinkKey::Distance => "distance",
            SinkKey::Main1 => "main1",
            SinkKey::Main2 => "main2",
            SinkKey::Cam3 => "cam3",
            SinkKey::Cam4 => "cam4",
        }
    }

    pub fn is_thermal(&self) -> bool {
        matches!(
            self,
            SinkKey::Main1 | SinkKey::Main2 | SinkKey::Cam3 | SinkKey::Cam4
        )
    }

    pub fn file_name(&self) -> String {
        if self.is_thermal() {
            format!("thermal_{}.csv", self.as_str())
        } else {
            format!("{}.csv", self.as_str())
        }
    }

    pub fn header(&self) -> Vec<String> {
        let fixed: &[&str] = match self {
            SinkKey::Imu => &[
                "timestamp",
                "gyro_x_dps",
                "gyro_y_dps",
                "gyro_z_dps",
                "accel_x_mps2",
                "accel_y_mps2",
                "accel_z_mps2",
            ],
            SinkKey::Pir => &["timestamp", "motion", "presence", "ambient"],
            SinkKey::Distance => &["timestamp", "distance_cm"],
            _ => return thermal_header(crate::types::thermal::FRAME_PIXELS),
        };
        fixed.iter().map(|s| s.to_string()).collect()
    }
}

impl Display for SinkKey {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SinkKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SinkKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown sink key: {}", s))
    }
}

pub fn thermal_header(pixels: usize) -> Vec<String> {
    std::iter::once("timestamp".to_string())
        .chain((0..pixels).map(|i| format!("p{}", i)))
        .collect()
}

/// Append-only CSV file with a header written once.
///
/// Rows are encoded into memory and only appended to the file, whole, by `flush`.
pub struct CsvSink {
    path: PathBuf,
    file: File,
    pending: csv::Writer<Vec<u8>>,
}

fn row_encoder() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

impl CsvSink {
    /// Open `path` for append, creating parent directories.
    ///
    /// The header is written only when the file is empty, so reopening after a
    /// restart keeps every existing row and never duplicates the header.
    pub fn open(path: impl AsRef<Path>, header: &[String]) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| SinkError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        let is_empty = file.metadata().map_err(io_err)?.len() == 0;

        let mut sink = CsvSink {
            file,
            pending: row_encoder(),
            path,
        };

        if is_empty {
            sink.write(header)?;
            sink.flush()?;
        }
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Buffer one row. Nothing reaches disk until `flush`.
    pub fn write<S: AsRef<[u8]>>(&mut self, row: &[S]) -> Result<(), SinkError> {
        self.pending.write_record(row).map_err(|source| SinkError::Csv {
            path: self.path.clone(),
            source,
        })
    }

    /// Append every buffered row in one write, then sync the file.
    pub fn flush(&mut self) -> Result<(), SinkError> {
        let io_err = |source| SinkError::Io {
            path: self.path.clone(),
            source,
        };
        let encoder = std::mem::replace(&mut self.pending, row_encoder());
        let bytes = encoder.into_inner().map_err(|e| io_err(e.into_error()))?;
        if !bytes.is_empty() {
            self.file.write_all(&bytes).map_err(io_err)?;
        }
        self.file.sync_data().map_err(io_err)
    }
}

pub type SharedSink = Arc<Mutex<CsvSink>>;

/// Every sink of the process, opened once at startup and never changed afterwards.
pub struct SinkSet {
    sinks: HashMap<SinkKey, SharedSink>,
}

impl SinkSet {
    pub fn open_all(out_dir: impl AsRef<Path>) -> Result<Self, SinkError> {
        let out_dir = out_dir.as_ref();
        let mut sinks = HashMap::new();
        for key in SinkKey::ALL {
            let sink = CsvSink::open(out_dir.join(key.file_name()), &key.header())?;
            log::info!("Sink {} -> {}", key, sink.path().display());
            sinks.insert(key, Arc::new(Mutex::new(sink)));
        }
        Ok(SinkSet { sinks })
    }

    pub fn get(&self, key: SinkKey) -> Option<SharedSink> {
        self.sinks.get(&key).cloned()
    }
}

/// Lock a shared sink and run `f` on it.
pub fn with_sink<T>(
    key: SinkKey,
    sink: &SharedSink,
    f: impl FnOnce(&mut CsvSink) -> Result<T, SinkError>,
) -> Result<T, SinkError> {
    let mut guard = sink
        .lock()
        .map_err(|_| SinkError::Poisoned(key.to_string()))?;
    f(&mut guard)
}

pub fn fmt_timestamp(ts: f64) -> String {
    format!("{:.*}", UNIT_DECIMALS, ts)
}

fn fmt_unit(v: f32) -> String {
    format!("{:.*}", UNIT_DECIMALS, v)
}

pub fn imu_row(ts: f64, meta: &MetaRecord) -> Vec<String> {
    let mut row = vec![fmt_timestamp(ts)];
    match meta.imu {
        ImuReading::Directional { gyro, accel } => {
            row.extend(gyro.iter().chain(accel.iter()).map(|v| fmt_unit(*v)));
        }
        // Old firmware only knows magnitudes, keep the row with blank axes
        ImuReading::Magnitude { .. } => row.extend(std::iter::repeat(String::new()).take(6)),
    }
    row
}

pub fn pir_row(ts: f64, meta: &MetaRecord) -> Vec<String> {
    vec![
        fmt_timestamp(ts),
        meta.motion.to_string(),
        meta.presence.to_string(),
        fmt_unit(meta.ambient),
    ]
}

pub fn distance_row(ts: f64, meta: &MetaRecord) -> Vec<String> {
    vec![
        fmt_timestamp(ts),
        meta.distance_cm.map(fmt_unit).unwrap_or_default(),
    ]
}

pub fn thermal_row(ts: f64, frame: &ThermalFrame) -> Vec<String> {
    std::iter::once(fmt_timestamp(ts))
        .chain(
            frame
                .values()
                .iter()
                .map(|v| format!("{:.*}", THERMAL_DECIMALS, v)),
        )
        .collect()
}
