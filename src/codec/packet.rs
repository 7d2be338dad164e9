use super::header::{Header, HeaderLayout};
use crate::error::DecodeError;
use crate::types::{ImuReading, MetaRecord, ThermalFrame};

/// Main controller, meta + front/rear thermal arrays.
pub const VERSION_MAIN: u8 = 1;
/// Thermal camera, one array.
pub const VERSION_CAMERA: u8 = 2;

/// motion, presence (i16) + ambient, gyro xyz, accel xyz (f32)
pub const META_V1_NEW_LEN: usize = 2 * 2 + 7 * 4;
/// motion, presence (i16) + ambient, gyro magnitude, accel magnitude (f32)
pub const META_V1_OLD_LEN: usize = 2 * 2 + 3 * 4;

/// A fully decoded binary message.
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    pub header: Header,
    pub layout: HeaderLayout,
    pub meta: Option<MetaRecord>,
    pub primary: ThermalFrame,
    pub secondary: Option<ThermalFrame>,
}

/// Decode one binary message.
///
/// Version 1 payloads are told apart purely by total length, so the whole
/// length check happens before any field is read.
pub fn decode_packet(buf: &[u8]) -> Result<Packet, DecodeError> {
    let (header, layout) = Header::parse(buf)?;
    let off = layout.encoded_len();

    let n = header.pixel_count();
    if n == 0 {
        return Err(DecodeError::InvalidDimensions {
            columns: header.columns,
            rows: header.rows,
        });
    }

    match header.version {
        VERSION_MAIN => {
            let need_new = off + META_V1_NEW_LEN + n * 4 * 2;
            let need_old = off + META_V1_OLD_LEN + n * 4 * 2;

            let (meta, arrays_off) = if buf.len() == need_new {
                (read_meta_new(buf, off), off + META_V1_NEW_LEN)
            } else if buf.len() == need_old {
                (read_meta_old(buf, off), off + META_V1_OLD_LEN)
            } else {
                return Err(DecodeError::SizeMismatch {
                    version: header.version,
                    got: buf.len(),
                    expected: vec![need_new, need_old],
                });
            };

            let primary = ThermalFrame::from_le_bytes(buf, arrays_off, n);
            let secondary = ThermalFrame::from_le_bytes(buf, arrays_off + n * 4, n);
            Ok(Packet {
                header,
                layout,
                meta: Some(meta),
                primary,
                secondary: Some(secondary),
            })
        }
        VERSION_CAMERA => {
            let need = off + n * 4;
            if buf.len() != need {
                return Err(DecodeError::SizeMismatch {
                    version: header.version,
                    got: buf.len(),
                    expected: vec![need],
                });
            }
            Ok(Packet {
                header,
                layout,
                meta: None,
                primary: ThermalFrame::from_le_bytes(buf, off, n),
                secondary: None,
            })
        }
        other => Err(DecodeError::UnsupportedVersion(other)),
    }
}

fn read_i16(buf: &[u8], off: usize) -> i16 {
    i16::from_le_bytes([buf[off], buf[off + 1]])
}

fn read_f32(buf: &[u8], off: usize) -> f32 {
    f32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn read_meta_new(buf: &[u8], off: usize) -> MetaRecord {
    let f = |i: usize| read_f32(buf, off + 4 + i * 4);
    MetaRecord {
        motion: read_i16(buf, off),
        presence: read_i16(buf, off + 2),
        ambient: f(0),
        imu: ImuReading::Directional {
            gyro: [f(1), f(2), f(3)],
            accel: [f(4), f(5), f(6)],
        },
        distance_cm: None,
    }
}

fn read_meta_old(buf: &[u8], off: usize) -> MetaRecord {
    let f = |i: usize| read_f32(buf, off + 4 + i * 4);
    MetaRecord {
        motion: read_i16(buf, off),
        presence: read_i16(buf, off + 2),
        ambient: f(0),
        imu: ImuReading::Magnitude {
            gyro_mag: f(1),
            accel_mag: f(2),
        },
        distance_cm: None,
    }
}

/// Build a version-1 message. The IMU variant selects the old or new meta layout.
pub fn encode_main_packet(
    layout: HeaderLayout,
    columns: u16,
    rows: u16,
    meta: &MetaRecord,
    front: &[f32],
    rear: &[f32],
) -> Vec<u8> {
    let mut out = Header::new(VERSION_MAIN, columns, rows).encode(layout);
    out.extend_from_slice(&meta.motion.to_le_bytes());
    out.extend_from_slice(&meta.presence.to_le_bytes());
    out.extend_from_slice(&meta.ambient.to_le_bytes());
    match meta.imu {
        ImuReading::Directional { gyro, accel } => {
            for v in gyro.iter().chain(accel.iter()) {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        ImuReading::Magnitude {
            gyro_mag,
            accel_mag,
        } => {
            out.extend_from_slice(&gyro_mag.to_le_bytes());
            out.extend_from_slice(&accel_mag.to_le_bytes());
        }
    }
    push_floats(&mut out, front);
    push_floats(&mut out, rear);
    out
}

/// Build a version-2 (single array) message.
pub fn encode_camera_packet(layout: HeaderLayout, columns: u16, rows: u16, pixels: &[f32]) -> Vec<u8> {
    let mut out = Header::new(VERSION_CAMERA, columns, rows).encode(layout);
    push_floats(&mut out, pixels);
    out
}

fn push_floats(out: &mut Vec<u8>, values: &[f32]) {
    out.reserve(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize, base: f32) -> Vec<f32> {
        (0..n).map(|i| base + i as f32 * 0.25).collect()
    }

    fn directional_meta() -> MetaRecord {
        MetaRecord {
            motion: 1,
            presence: -3,
            ambient: 23.75,
            imu: ImuReading::Directional {
                gyro: [0.5, -1.25, 3.0],
                accel: [0.1, 9.81, -0.2],
            },
            distance_cm: None,
        }
    }

    #[test]
    fn test_meta_lengths() {
        assert_eq!(META_V1_NEW_LEN, 32);
        assert_eq!(META_V1_OLD_LEN, 16);
    }

    #[test]
    fn test_v1_new_layout_recovers_directional_fields() {
        for layout in [HeaderLayout::WithMagic, HeaderLayout::NoMagic] {
            let (cols, rows) = (4u16, 3u16);
            let n = 12;
            let front = ramp(n, 20.0);
            let rear = ramp(n, 30.0);
            let buf = encode_main_packet(layout, cols, rows, &directional_meta(), &front, &rear);
            assert_eq!(buf.len(), layout.encoded_len() + META_V1_NEW_LEN + 2 * n * 4);

            let packet = decode_packet(&buf).unwrap();
            assert_eq!(packet.header, Header::new(1, cols, rows));
            assert_eq!(packet.layout, layout);
            let meta = packet.meta.unwrap();
            assert_eq!(meta, directional_meta());
            assert!(meta.imu.is_directional());
            assert_eq!(meta.distance_cm, None);
            assert_eq!(packet.primary.values(), front.as_slice());
            assert_eq!(packet.secondary.unwrap().values(), rear.as_slice());
        }
    }

    #[test]
    fn test_v1_old_layout_recovers_magnitudes() {
        let meta = MetaRecord {
            motion: 0,
            presence: 1,
            ambient: 21.5,
            imu: ImuReading::Magnitude {
                gyro_mag: 4.5,
                accel_mag: 9.75,
            },
            distance_cm: None,
        };
        let n = 32 * 24;
        let front = ramp(n, 18.0);
        let rear = ramp(n, 19.0);
        let buf = encode_main_packet(HeaderLayout::WithMagic, 32, 24, &meta, &front, &rear);
        assert_eq!(buf.len(), 8 + 16 + 2 * n * 4);

        let packet = decode_packet(&buf).unwrap();
        let decoded = packet.meta.unwrap();
        assert_eq!(
            decoded.imu,
            ImuReading::Magnitude {
                gyro_mag: 4.5,
                accel_mag: 9.75
            }
        );
        assert_eq!(decoded.ambient, 21.5);
        assert_eq!(packet.primary.len(), n);
        assert_eq!(packet.secondary.unwrap().values()[n - 1], rear[n - 1]);
    }

    #[test]
    fn test_v1_size_mismatch_reports_both_lengths() {
        let front = ramp(4, 0.0);
        let mut buf = encode_main_packet(HeaderLayout::NoMagic, 2, 2, &directional_meta(), &front, &front);
        buf.push(0);

        match decode_packet(&buf) {
            Err(DecodeError::SizeMismatch {
                version,
                got,
                expected,
            }) => {
                assert_eq!(version, 1);
                assert_eq!(got, 6 + 32 + 32 + 1);
                assert_eq!(expected, vec![6 + 32 + 32, 6 + 16 + 32]);
            }
            other => panic!("expected size mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_v2_roundtrip() {
        let pixels = ramp(32 * 24, 25.0);
        let buf = encode_camera_packet(HeaderLayout::NoMagic, 32, 24, &pixels);
        let packet = decode_packet(&buf).unwrap();
        assert_eq!(packet.header.version, 2);
        assert!(packet.meta.is_none());
        assert!(packet.secondary.is_none());
        assert_eq!(packet.primary.values(), pixels.as_slice());
    }

    #[test]
    fn test_v2_wrong_length_always_fails() {
        let pixels = ramp(6, 25.0);
        let good = encode_camera_packet(HeaderLayout::WithMagic, 3, 2, &pixels);
        for len in 8..good.len() + 8 {
            if len == good.len() {
                continue;
            }
            let mut buf = good.clone();
            buf.resize(len, 0);
            match decode_packet(&buf) {
                Err(DecodeError::SizeMismatch { expected, .. }) => {
                    assert_eq!(expected, vec![8 + 24]);
                }
                other => panic!("len {}: expected size mismatch, got {:?}", len, other),
            }
        }
    }

    #[test]
    fn test_zero_dimensions() {
        let buf = Header::new(2, 0, 24).encode(HeaderLayout::NoMagic);
        assert_eq!(
            decode_packet(&buf),
            Err(DecodeError::InvalidDimensions { columns: 0, rows: 24 })
        );
    }

    #[test]
    fn test_unsupported_version() {
        let mut buf = Header::new(7, 1, 1).encode(HeaderLayout::NoMagic);
        buf.extend_from_slice(&1.0f32.to_le_bytes());
        assert_eq!(decode_packet(&buf), Err(DecodeError::UnsupportedVersion(7)));
    }
}
