//! Synthetic sensor endpoints for bench runs without hardware.

use crate::codec::{encode_camera_packet, encode_main_packet, encode_text_rows, HeaderLayout};
use crate::types::thermal::{FRAME_HEIGHT, FRAME_PIXELS, FRAME_WIDTH};
use crate::types::{ImuReading, MetaRecord, RawFrame};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use std::f32::consts::PI;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::interval;

/// What kind of device to imitate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimKind {
    /// Main controller, per-axis IMU
    MainNew,
    /// Main controller, magnitude-only IMU
    MainOld,
    CameraBinary,
    /// Camera sending one text row per message
    CameraText,
}

impl FromStr for SimKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main-new" => Ok(SimKind::MainNew),
            "main-old" => Ok(SimKind::MainOld),
            "camera-binary" => Ok(SimKind::CameraBinary),
            "camera-text" => Ok(SimKind::CameraText),
            other => Err(format!(
                "unknown kind {} (main-new, main-old, camera-binary, camera-text)",
                other
            )),
        }
    }
}

/// Produces the messages of one simulated device, frame after frame.
pub struct FrameSynth {
    kind: SimKind,
    layout: HeaderLayout,
    seq: u64,
}

impl FrameSynth {
    pub fn new(kind: SimKind, layout: HeaderLayout) -> Self {
        Self {
            kind,
            layout,
            seq: 0,
        }
    }

    /// Messages for the next frame. Text cameras split one frame into 24 row messages.
    pub fn next_messages(&mut self) -> Vec<RawFrame> {
        let t = self.seq as f32 * 0.1;
        self.seq += 1;

        let cols = FRAME_WIDTH as u16;
        let rows = FRAME_HEIGHT as u16;
        match self.kind {
            SimKind::MainNew | SimKind::MainOld => {
                let meta = mock_meta(t, self.kind == SimKind::MainNew);
                vec![RawFrame::Binary(encode_main_packet(
                    self.layout,
                    cols,
                    rows,
                    &meta,
                    &mock_pixels(t, 22.0),
                    &mock_pixels(t + 1.5, 24.0),
                ))]
            }
            SimKind::CameraBinary => vec![RawFrame::Binary(encode_camera_packet(
                self.layout,
                cols,
                rows,
                &mock_pixels(t, 21.0),
            ))],
            SimKind::CameraText => mock_pixels(t, 21.0)
                .chunks(FRAME_WIDTH)
                .map(|row| RawFrame::Text(encode_text_rows(row, FRAME_WIDTH)))
                .collect(),
        }
    }
}

fn mock_meta(t: f32, directional: bool) -> MetaRecord {
    let gyro = [(t * 0.5).sin() * 3.0, (t * 0.3).cos() * 2.0, (t).sin() * 5.0];
    let accel = [(t * 2.0 * PI).sin() * 0.5, (t * 2.0 * PI).cos() * 0.3, 9.81];
    let imu = if directional {
        ImuReading::Directional { gyro, accel }
    } else {
        ImuReading::Magnitude {
            gyro_mag: gyro.iter().map(|v| v * v).sum::<f32>().sqrt(),
            accel_mag: accel.iter().map(|v| v * v).sum::<f32>().sqrt(),
        }
    };
    MetaRecord {
        motion: ((t * 0.2).sin() > 0.5) as i16,
        presence: ((t * 0.1).sin() > 0.0) as i16,
        ambient: 23.0 + (t * 0.05).sin(),
        imu,
        distance_cm: None,
    }
}

/// Background near `base` with a warm blob drifting across the frame.
fn mock_pixels(t: f32, base: f32) -> Vec<f32> {
    let cx = (FRAME_WIDTH as f32 / 2.0) * (1.0 + (t * 0.4).sin());
    let cy = (FRAME_HEIGHT as f32 / 2.0) * (1.0 + (t * 0.25).cos());
    (0..FRAME_PIXELS)
        .map(|i| {
            let x = (i % FRAME_WIDTH) as f32;
            let y = (i / FRAME_WIDTH) as f32;
            let d2 = (x - cx).powi(2) + (y - cy).powi(2);
            base + 9.0 * (-d2 / 18.0).exp()
        })
        .collect()
}

#[derive(Clone, Copy, Debug)]
pub struct SimSettings {
    pub kind: SimKind,
    pub layout: HeaderLayout,
    pub interval: Duration,
    /// Stop and close after this many frames
    pub frames: Option<u64>,
}

/// WebSocket endpoint at `/` serving one synthetic stream per client.
pub fn router(settings: SimSettings) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .with_state(settings)
}

async fn ws_handler(ws: WebSocketUpgrade, State(settings): State<SimSettings>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_frames(socket, settings))
}

async fn stream_frames(mut socket: WebSocket, settings: SimSettings) {
    let mut synth = FrameSynth::new(settings.kind, settings.layout);
    let mut ticker = interval(settings.interval);
    let mut sent = 0u64;

    log::info!("[sim] client connected ({:?})", settings.kind);
    loop {
        if settings.frames.is_some_and(|limit| sent >= limit) {
            let _ = socket.send(Message::Close(None)).await;
            break;
        }
        ticker.tick().await;

        for frame in synth.next_messages() {
            let msg = match frame {
                RawFrame::Binary(bytes) => Message::Binary(bytes),
                RawFrame::Text(text) => Message::Text(text),
            };
            if socket.send(msg).await.is_err() {
                log::info!("[sim] client gone after {} frames", sent);
                return;
            }
        }
        sent += 1;
        if sent % 100 == 0 {
            log::info!("[sim] {} frames", sent);
        }
    }
}
