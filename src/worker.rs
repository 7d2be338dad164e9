//! One connection worker per sensor endpoint.
//!
//! A worker owns its connection, its decoder state and its rate tracker.
//! The only things it shares are the sinks its role is allowed to write
//! and the status board.

use crate::codec::{Decoded, FrameDecoder, Packet};
use crate::config::{EndpointConfig, EndpointRole, LoggerConfig};
use crate::error::{SinkError, WorkerError};
use crate::rate::RateTracker;
use crate::sink::{
    distance_row, imu_row, pir_row, thermal_row, with_sink, SharedSink, SinkKey, SinkSet,
};
use crate::status::StatusBoard;
use crate::transport::Connector;
use crate::types::{current_timestamp, ImuReading, MetaRecord, RawFrame, ThermalFrame};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Disconnected,
    Connecting,
    Connected,
    Receiving,
    /// Last frame was rejected; left on the next good frame
    Recovering,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerEvent {
    ConnectStarted,
    ConnectSucceeded,
    FrameDecoded,
    FrameRejected,
    TransportFault,
    Shutdown,
}

impl WorkerState {
    /// Next state for `event`. Events that make no sense in the current state leave it unchanged.
    pub fn on(self, event: WorkerEvent) -> WorkerState {
        use WorkerEvent::*;
        use WorkerState::*;
        match (self, event) {
            (_, Shutdown) | (_, TransportFault) => Disconnected,
            (Disconnected, ConnectStarted) => Connecting,
            (Connecting, ConnectSucceeded) => Connected,
            (Connected | Receiving | Recovering, FrameDecoded) => Receiving,
            (Connected | Receiving | Recovering, FrameRejected) => Recovering,
            (state, _) => state,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            WorkerState::Connected | WorkerState::Receiving | WorkerState::Recovering
        )
    }
}

/// Resolves once shutdown was requested or every sender is gone.
pub async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[derive(Clone)]
struct Channel {
    key: SinkKey,
    sink: SharedSink,
}

impl Channel {
    fn write(&self, row: &[String]) -> Result<(), SinkError> {
        with_sink(self.key, &self.sink, |s| s.write(row))
    }

    fn flush(&self) -> Result<(), SinkError> {
        with_sink(self.key, &self.sink, |s| s.flush())
    }
}

#[derive(Clone)]
struct MetaChannels {
    imu: Channel,
    pir: Channel,
    distance: Channel,
}

/// The sinks one endpoint is authorized to write, and nothing else.
#[derive(Clone)]
pub struct EndpointSinks {
    meta: Option<MetaChannels>,
    primary: Channel,
    secondary: Option<Channel>,
}

impl EndpointSinks {
    /// Pick the sinks for `role` out of the process-wide set.
    pub fn for_role(role: &EndpointRole, set: &SinkSet) -> Option<Self> {
        let channel = |key: SinkKey| set.get(key).map(|sink| Channel { key, sink });
        match role {
            EndpointRole::Main => Some(EndpointSinks {
                meta: Some(MetaChannels {
                    imu: channel(SinkKey::Imu)?,
                    pir: channel(SinkKey::Pir)?,
                    distance: channel(SinkKey::Distance)?,
                }),
                primary: channel(SinkKey::Main1)?,
                secondary: Some(channel(SinkKey::Main2)?),
            }),
            EndpointRole::Camera { sink } => Some(EndpointSinks {
                meta: None,
                primary: channel(*sink)?,
                secondary: None,
            }),
        }
    }

    pub fn keys(&self) -> Vec<SinkKey> {
        self.channels().map(|c| c.key).collect()
    }

    fn channels(&self) -> impl Iterator<Item = &Channel> {
        let meta = self
            .meta
            .iter()
            .flat_map(|m| [&m.imu, &m.pir, &m.distance]);
        meta.chain(std::iter::once(&self.primary))
            .chain(self.secondary.iter())
    }

    fn flush_all(&self) -> Result<(), SinkError> {
        for channel in self.channels() {
            channel.flush()?;
        }
        Ok(())
    }
}

pub struct ConnectionWorker {
    name: String,
    url: String,
    connector: Arc<dyn Connector>,
    sinks: EndpointSinks,
    decoder: FrameDecoder,
    rate: RateTracker,
    count: u64,
    print_every: u64,
    reconnect_delay: Duration,
    state: WorkerState,
    status: StatusBoard,
}

impl ConnectionWorker {
    pub fn new(
        endpoint: &EndpointConfig,
        config: &LoggerConfig,
        connector: Arc<dyn Connector>,
        sinks: EndpointSinks,
        status: StatusBoard,
    ) -> Self {
        Self {
            name: endpoint.name.clone(),
            url: endpoint.url.clone(),
            connector,
            sinks,
            // Lives across reconnects, so a partial text frame continues on the next session
            decoder: FrameDecoder::new(),
            rate: RateTracker::new(),
            count: 0,
            print_every: config.print_every.max(1),
            reconnect_delay: config.reconnect_delay(),
            state: WorkerState::Disconnected,
            status,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Messages successfully decoded and written so far.
    pub fn processed(&self) -> u64 {
        self.count
    }

    /// Connect, receive, reconnect after a fixed delay, until shutdown.
    ///
    /// Transport faults are logged and retried. Only a sink failure ends the
    /// worker with an error.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), WorkerError> {
        self.status.register(&self.name, &self.url).await;
        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();

        loop {
            self.transition(WorkerEvent::ConnectStarted).await;

            let connected = tokio::select! {
                r = connector.connect(&url) => r,
                _ = shutdown_requested(&mut shutdown) => break,
            };

            let fault = match connected {
                Ok(mut stream) => {
                    log::info!("Connected: {} -> {}", self.name, url);
                    self.transition(WorkerEvent::ConnectSucceeded).await;
                    loop {
                        let next = tokio::select! {
                            r = stream.next_frame() => r,
                            _ = shutdown_requested(&mut shutdown) => {
                                self.transition(WorkerEvent::Shutdown).await;
                                return Ok(());
                            }
                        };
                        match next {
                            Ok(frame) => self.handle_frame(&frame, current_timestamp()).await?,
                            Err(e) => break e,
                        }
                    }
                }
                Err(e) => e,
            };

            log::warn!(
                "[{}] connect/error: {} -> retry in {:?}",
                self.name,
                fault,
                self.reconnect_delay
            );
            self.transition(WorkerEvent::TransportFault).await;
            self.status.update(&self.name, |s| s.reconnects += 1).await;

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        self.transition(WorkerEvent::Shutdown).await;
        Ok(())
    }

    /// Decode one message and append whatever it carries.
    pub async fn handle_frame(&mut self, frame: &RawFrame, ts: f64) -> Result<(), WorkerError> {
        match frame {
            RawFrame::Binary(buf) => log::debug!(
                "[{}] received binary: bytes={} head={:02x?}",
                self.name,
                buf.len(),
                &buf[..buf.len().min(16)]
            ),
            RawFrame::Text(text) => log::debug!(
                "[{}] received text: {:?}",
                self.name,
                text.chars().take(120).collect::<String>()
            ),
        }

        let decoded = match self.decoder.decode(frame) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("[{}] parse error: {} (bytes={})", self.name, e, frame.len());
                self.transition(WorkerEvent::FrameRejected).await;
                self.status.update(&self.name, |s| s.frames_rejected += 1).await;
                return Ok(());
            }
        };

        let line = match decoded {
            Decoded::Pending => return Ok(()),
            Decoded::Dropped(reason) => {
                log::debug!("[{}] text dropped: {}", self.name, reason);
                self.status
                    .update(&self.name, |s| s.frames_dropped_text += 1)
                    .await;
                return Ok(());
            }
            Decoded::TextFrame(thermal) => {
                self.sinks
                    .primary
                    .write(&thermal_row(ts, &thermal))
                    .map_err(|e| self.sink_error(e))?;
                Summary::Text(thermal)
            }
            Decoded::Packet(packet) => {
                self.route_packet(ts, &packet)
                    .map_err(|e| self.sink_error(e))?;
                Summary::Packet(packet)
            }
        };

        self.count += 1;
        let fps = self.rate.tick();
        self.transition(WorkerEvent::FrameDecoded).await;
        self.status
            .update(&self.name, |s| {
                s.frames_ok += 1;
                s.fps = fps;
                s.last_frame_ts = Some(ts);
            })
            .await;

        if self.count % self.print_every == 0 {
            // fsync blocks, keep it off the runtime threads other workers share
            let sinks = self.sinks.clone();
            tokio::task::spawn_blocking(move || sinks.flush_all())
                .await
                .map_err(|e| SinkError::FlushTask(e.to_string()))
                .and_then(|flushed| flushed)
                .map_err(|e| self.sink_error(e))?;
            log::info!("{}", line.render(&self.name, fps));
        }
        Ok(())
    }

    fn route_packet(&self, ts: f64, packet: &Packet) -> Result<(), SinkError> {
        if let Some(meta) = &packet.meta {
            match &self.sinks.meta {
                Some(channels) => {
                    channels.imu.write(&imu_row(ts, meta))?;
                    channels.pir.write(&pir_row(ts, meta))?;
                    channels.distance.write(&distance_row(ts, meta))?;
                }
                None => log::debug!("[{}] no meta sinks, meta record discarded", self.name),
            }
        }

        self.sinks.primary.write(&thermal_row(ts, &packet.primary))?;

        if let Some(secondary) = &packet.secondary {
            match &self.sinks.secondary {
                Some(channel) => channel.write(&thermal_row(ts, secondary))?,
                None => log::debug!("[{}] no secondary sink, rear array discarded", self.name),
            }
        }
        Ok(())
    }

    fn sink_error(&self, source: SinkError) -> WorkerError {
        WorkerError::Sink {
            endpoint: self.name.clone(),
            source,
        }
    }

    async fn transition(&mut self, event: WorkerEvent) {
        let next = self.state.on(event);
        if next != self.state {
            log::debug!("[{}] {:?} -> {:?}", self.name, self.state, next);
            self.state = next;
            self.status.update(&self.name, |s| s.state = next).await;
        }
    }
}

/// What the periodic throughput line describes.
enum Summary {
    Packet(Packet),
    Text(ThermalFrame),
}

impl Summary {
    fn render(&self, name: &str, fps: f64) -> String {
        match self {
            Summary::Text(frame) => {
                let (mn, mx) = min_max_or_nan(frame);
                format!(
                    "[{}] TEXT frame {}x{} fps~{:.1} f1[min,max]=({:.1},{:.1})",
                    name,
                    crate::types::thermal::FRAME_WIDTH,
                    crate::types::thermal::FRAME_HEIGHT,
                    fps,
                    mn,
                    mx
                )
            }
            Summary::Packet(p) => {
                let (mn, mx) = min_max_or_nan(&p.primary);
                let extra = p.meta.as_ref().map(meta_summary).unwrap_or_default();
                format!(
                    "[{}] v{} {}x{} fps~{:.1} f1[min,max]=({:.1},{:.1}){}",
                    name, p.header.version, p.header.columns, p.header.rows, fps, mn, mx, extra
                )
            }
        }
    }
}

fn min_max_or_nan(frame: &ThermalFrame) -> (f32, f32) {
    frame.min_max().unwrap_or((f32::NAN, f32::NAN))
}

fn meta_summary(meta: &MetaRecord) -> String {
    let head = format!(
        " | motion={} presence={} amb={:.2}",
        meta.motion, meta.presence, meta.ambient
    );
    match meta.imu {
        ImuReading::Directional { gyro, accel } => format!(
            "{} gyro=({:.2},{:.2},{:.2}) accel=({:.2},{:.2},{:.2})",
            head, gyro[0], gyro[1], gyro[2], accel[0], accel[1], accel[2]
        ),
        ImuReading::Magnitude {
            gyro_mag,
            accel_mag,
        } => format!("{} gyroMag={:.3} accelMag={:.3}", head, gyro_mag, accel_mag),
    }
}
