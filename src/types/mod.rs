pub mod thermal;

pub use thermal::ThermalFrame;

use serde::{Deserialize, Serialize};

/// IMU payload of a main-controller message.
///
/// Old firmware only reports magnitudes; new firmware reports per-axis values.
/// Consumers must handle both shapes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImuReading {
    /// Gyro in deg/s, accel in m/s^2
    Directional { gyro: [f32; 3], accel: [f32; 3] },
    Magnitude { gyro_mag: f32, accel_mag: f32 },
}

impl ImuReading {
    pub fn is_directional(&self) -> bool {
        matches!(self, ImuReading::Directional { .. })
    }
}

/// Scalar sensor bundle carried by version-1 messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetaRecord {
    pub motion: i16,
    pub presence: i16,
    pub ambient: f32,
    pub imu: ImuReading,
    /// Reserved for a ranging sensor that no firmware reports yet. Always `None` after decode.
    pub distance_cm: Option<f32>,
}

/// One inbound message as it came off the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum RawFrame {
    Binary(Vec<u8>),
    Text(String),
}

impl RawFrame {
    pub fn len(&self) -> usize {
        match self {
            RawFrame::Binary(b) => b.len(),
            RawFrame::Text(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn current_timestamp() -> f64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
