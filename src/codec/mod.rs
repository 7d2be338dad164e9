//! Wire format of the sensor endpoints.
//!
//! Binary messages carry a small header (with or without the `"MC"` marker)
//! followed by a version specific payload. Text messages carry thermal pixels
//! as comma separated floats, either a whole frame or one row at a time.

pub mod header;
pub mod packet;
pub mod text;

pub use header::{Header, HeaderLayout, MAGIC};
pub use packet::{decode_packet, encode_camera_packet, encode_main_packet, Packet};
pub use text::{encode_text_rows, TextDrop, TextFrameAssembler, TextOutcome};

use crate::error::DecodeError;
use crate::types::{RawFrame, ThermalFrame};

/// What one inbound message turned into.
#[derive(Clone, Debug, PartialEq)]
pub enum Decoded {
    Packet(Packet),
    /// Complete thermal frame assembled from text
    TextFrame(ThermalFrame),
    /// Text row buffered, no frame yet
    Pending,
    /// Text payload ignored
    Dropped(TextDrop),
}

/// Per-connection decoder. Owns the only cross-message state of the codec path.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    text: TextFrameAssembler,
}

impl FrameDecoder {
    pub fn new() -> Self {
        FrameDecoder {
            text: TextFrameAssembler::new(),
        }
    }

    pub fn decode(&mut self, frame: &RawFrame) -> Result<Decoded, DecodeError> {
        match frame {
            RawFrame::Binary(buf) => decode_packet(buf).map(Decoded::Packet),
            RawFrame::Text(text) => Ok(match self.text.feed(text) {
                TextOutcome::Frame(f) => Decoded::TextFrame(f),
                TextOutcome::Buffered { .. } => Decoded::Pending,
                TextOutcome::Dropped(reason) => Decoded::Dropped(reason),
            }),
        }
    }

    pub fn pending_text_values(&self) -> usize {
        self.text.pending()
    }
}
