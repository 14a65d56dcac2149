// Batch module - split color runs into the fewest frames that fit
//
// Offset frame payload:   [count, offset, color * count]
// Indexed frame payload:  [count, (index, color) * count]
//
// Frames are emitted in order; each offset frame starts where the previous
// one stopped. The last frame carries the remainder and is always emitted
// when non-empty.

use super::color::{WireColor, COLOR_WIRE_LEN};
use crate::error::DeviceError;

/// Count byte + offset byte
pub const OFFSET_HEADER_LEN: usize = 2;

/// Count byte
pub const INDEXED_HEADER_LEN: usize = 1;

/// Index byte + color
pub const INDEXED_RECORD_LEN: usize = 1 + COLOR_WIRE_LEN;

/// One past the highest LED index an offset byte can address
pub const MAX_LED_RUN_END: usize = 256;

/// Colors that fit in one offset frame
pub fn max_colors_per_frame(max_payload: usize, color_len: usize) -> usize {
    max_payload.saturating_sub(OFFSET_HEADER_LEN) / color_len
}

/// One contiguous-run frame payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightBatch {
    pub offset: u8,
    pub count: u8,
    pub payload: Vec<u8>,
}

pub struct BatchedLightCommandBuilder {
    max_payload: usize,
    colors_per_frame: usize,
    records_per_frame: usize,
}

impl BatchedLightCommandBuilder {
    /// # Panics
    /// Panics if `max_payload` cannot hold a header plus one color
    pub fn new(max_payload: usize) -> Self {
        let colors_per_frame = max_colors_per_frame(max_payload, COLOR_WIRE_LEN);
        let records_per_frame = max_payload.saturating_sub(INDEXED_HEADER_LEN) / INDEXED_RECORD_LEN;
        assert!(
            colors_per_frame > 0 && records_per_frame > 0,
            "max_payload {} cannot carry a single color",
            max_payload
        );
        Self {
            max_payload,
            colors_per_frame,
            records_per_frame,
        }
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    pub fn colors_per_frame(&self) -> usize {
        self.colors_per_frame
    }

    pub fn records_per_frame(&self) -> usize {
        self.records_per_frame
    }

    /// Split a contiguous run starting at LED `start_offset`
    ///
    /// Fails with `OffsetOutOfRange` when the run extends past LED 255;
    /// offsets are single bytes.
    pub fn build_offset<C: WireColor>(
        &self,
        colors: &[C],
        start_offset: u8,
    ) -> Result<Vec<LightBatch>, DeviceError> {
        if start_offset as usize + colors.len() > MAX_LED_RUN_END {
            return Err(DeviceError::OffsetOutOfRange {
                start: start_offset,
                count: colors.len(),
            });
        }

        let mut batches = Vec::with_capacity(colors.len().div_ceil(self.colors_per_frame));
        let mut sent = 0usize;
        for chunk in colors.chunks(self.colors_per_frame) {
            let offset = (start_offset as usize + sent) as u8;
            let count = chunk.len() as u8;

            let mut payload = Vec::with_capacity(OFFSET_HEADER_LEN + chunk.len() * COLOR_WIRE_LEN);
            payload.push(count);
            payload.push(offset);
            for color in chunk {
                payload.extend_from_slice(&color.to_wire());
            }

            batches.push(LightBatch {
                offset,
                count,
                payload,
            });
            sent += chunk.len();
        }
        Ok(batches)
    }

    /// Split `(led index, color)` pairs into indexed-set payloads
    pub fn build_indexed<C: WireColor>(&self, entries: &[(u8, C)]) -> Vec<Vec<u8>> {
        entries
            .chunks(self.records_per_frame)
            .map(|chunk| {
                let mut payload =
                    Vec::with_capacity(INDEXED_HEADER_LEN + chunk.len() * INDEXED_RECORD_LEN);
                payload.push(chunk.len() as u8);
                for (index, color) in chunk {
                    payload.push(*index);
                    payload.extend_from_slice(&color.to_wire());
                }
                payload
            })
            .collect()
    }
}
