use crate::types::thermal::{FRAME_PIXELS, FRAME_WIDTH};
use crate::types::ThermalFrame;

/// Why a text payload produced nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextDrop {
    /// At least one field is not a float
    Unparseable,
    /// Neither a full frame nor exactly one row
    UnexpectedLength(usize),
}

impl std::fmt::Display for TextDrop {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TextDrop::Unparseable => f.write_str("not a float list"),
            TextDrop::UnexpectedLength(n) => write!(f, "unexpected value count {}", n),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TextOutcome {
    /// A complete 32x24 frame is ready
    Frame(ThermalFrame),
    /// A row was buffered; `pending` values are waiting for the rest of the frame
    Buffered { pending: usize },
    Dropped(TextDrop),
}

/// Reassembles thermal frames sent as comma/newline separated text.
///
/// Some cameras send the whole frame in one message, others send one
/// 32-value row per message. Rows accumulate here until a frame is complete.
#[derive(Debug, Default)]
pub struct TextFrameAssembler {
    pending: Vec<f32>,
}

impl TextFrameAssembler {
    pub fn new() -> Self {
        TextFrameAssembler {
            pending: Vec::with_capacity(FRAME_PIXELS),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn feed(&mut self, text: &str) -> TextOutcome {
        let values = match parse_values(text) {
            Some(v) => v,
            None => return TextOutcome::Dropped(TextDrop::Unparseable),
        };

        if values.len() >= FRAME_PIXELS {
            // Excess values in a full-frame message are ignored
            let mut values = values;
            values.truncate(FRAME_PIXELS);
            return TextOutcome::Frame(ThermalFrame::new(values));
        }

        if values.len() == FRAME_WIDTH {
            self.pending.extend_from_slice(&values);
            if self.pending.len() >= FRAME_PIXELS {
                let frame: Vec<f32> = self.pending.drain(..FRAME_PIXELS).collect();
                return TextOutcome::Frame(ThermalFrame::new(frame));
            }
            return TextOutcome::Buffered {
                pending: self.pending.len(),
            };
        }

        TextOutcome::Dropped(TextDrop::UnexpectedLength(values.len()))
    }
}

/// Split on commas and line breaks, skip blank fields, parse every field as f32.
fn parse_values(text: &str) -> Option<Vec<f32>> {
    text.split(|c| c == ',' || c == '\n' || c == '\r')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<f32>().ok())
        .collect()
}

/// Render values the way cameras send them, `per_line` values per line.
pub fn encode_text_rows(values: &[f32], per_line: usize) -> String {
    values
        .chunks(per_line.max(1))
        .map(|row| {
            row.iter()
                .map(|v| format!("{:.2}", v))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::thermal::FRAME_HEIGHT;

    fn row(r: usize) -> Vec<f32> {
        (0..FRAME_WIDTH).map(|c| (r * FRAME_WIDTH + c) as f32).collect()
    }

    #[test]
    fn test_24_rows_make_one_frame_in_order() {
        let mut asm = TextFrameAssembler::new();
        for r in 0..FRAME_HEIGHT - 1 {
            let outcome = asm.feed(&encode_text_rows(&row(r), FRAME_WIDTH));
            assert_eq!(
                outcome,
                TextOutcome::Buffered {
                    pending: (r + 1) * FRAME_WIDTH
                }
            );
        }

        match asm.feed(&encode_text_rows(&row(FRAME_HEIGHT - 1), FRAME_WIDTH)) {
            TextOutcome::Frame(frame) => {
                let expected: Vec<f32> = (0..FRAME_PIXELS).map(|i| i as f32).collect();
                assert_eq!(frame.values(), expected.as_slice());
            }
            other => panic!("expected frame, got {:?}", other),
        }
        assert_eq!(asm.pending(), 0);
    }

    #[test]
    fn test_23_rows_emit_nothing() {
        let mut asm = TextFrameAssembler::new();
        for r in 0..23 {
            let outcome = asm.feed(&encode_text_rows(&row(r), FRAME_WIDTH));
            assert!(matches!(outcome, TextOutcome::Buffered { .. }));
        }
        assert_eq!(asm.pending(), 23 * FRAME_WIDTH);
    }

    #[test]
    fn test_full_frame_message_ignores_excess() {
        let mut asm = TextFrameAssembler::new();
        let values: Vec<f32> = (0..FRAME_PIXELS + 5).map(|i| i as f32 * 0.5).collect();
        match asm.feed(&encode_text_rows(&values, FRAME_WIDTH)) {
            TextOutcome::Frame(frame) => {
                assert_eq!(frame.len(), FRAME_PIXELS);
                assert_eq!(frame.values()[FRAME_PIXELS - 1], (FRAME_PIXELS - 1) as f32 * 0.5);
            }
            other => panic!("expected frame, got {:?}", other),
        }
        assert_eq!(asm.pending(), 0);
    }

    #[test]
    fn test_full_frame_leaves_partial_rows_untouched() {
        let mut asm = TextFrameAssembler::new();
        asm.feed(&encode_text_rows(&row(0), FRAME_WIDTH));
        let full: Vec<f32> = vec![20.0; FRAME_PIXELS];
        assert!(matches!(
            asm.feed(&encode_text_rows(&full, FRAME_WIDTH)),
            TextOutcome::Frame(_)
        ));
        assert_eq!(asm.pending(), FRAME_WIDTH);
    }

    #[test]
    fn test_crlf_and_blank_fields() {
        let mut asm = TextFrameAssembler::new();
        let text = format!("{},\r\n", encode_text_rows(&row(0), 8).replace('\n', "\r\n"));
        assert_eq!(asm.feed(&text), TextOutcome::Buffered { pending: 32 });
    }

    #[test]
    fn test_garbage_is_dropped() {
        let mut asm = TextFrameAssembler::new();
        assert_eq!(
            asm.feed("21.0,abc,22.0"),
            TextOutcome::Dropped(TextDrop::Unparseable)
        );
        assert_eq!(
            asm.feed("21.0,22.0"),
            TextOutcome::Dropped(TextDrop::UnexpectedLength(2))
        );
        assert_eq!(asm.feed(""), TextOutcome::Dropped(TextDrop::UnexpectedLength(0)));
        assert_eq!(asm.pending(), 0);
    }
}
