//! Input report decoding.
//!
//! One fixed-format report 0x01 carries the complete control surface
//! state. The decoder keeps the previous state, turns differences into
//! [`KontrolEvent`]s and pushes them into a channel; nothing downstream
//! runs inside the decode path, so a slow consumer cannot stall the
//! reader.
//!
//! # Report 0x01 layout
//!
//! | Offset | Content |
//! |--------|---------|
//! | 0      | report ID (0x01) |
//! | 1-3    | button bitmasks (bit index = `Button` discriminant) |
//! | 4      | knob-touch bitmask (8 capacitive sensors) |
//! | 5      | main-touch bitmask (bit 0) |
//! | 6      | main-encoder position, low nibble |
//! | 20-35  | 8 × u16 LE value-encoder counters (0..=999) |
//! | 36     | first note |
//!
//! The first report after construction (or [`reset`](InputDecoder::reset))
//! only establishes the baseline: encoder and octave changes against the
//! zeroed initial state are absorbed silently. Button edges are decoded
//! from the start.
//!
//! Turning a knob grazes its touch sensor on this hardware, so knob-touch
//! edges are not decoded on a report that also carries an encoder change.

use crate::controls::{Button, KNOB_TOUCH_BIT_BASE, MAIN_TOUCH_BIT_BASE};
use crate::events::KontrolEvent;
use crate::wrap;
use flume::Sender;

pub const INPUT_REPORT_ID: u8 = 0x01;
pub const NUM_ENCODERS: usize = 8;

/// Offset of the first note plus one; shorter reports are dropped.
pub const MIN_REPORT_LEN: usize = 37;

const OFS_BUTTONS: usize = 1;
const NUM_BUTTON_BYTES: usize = 3;
const OFS_KNOB_TOUCH: usize = 4;
const OFS_MAIN_TOUCH: usize = 5;
const OFS_MAIN_ENCODER: usize = 6;
const OFS_ENCODERS: usize = 20;
const OFS_FIRST_NOTE: usize = 36;

/// The value encoders advance their counter by 4 per detent.
const ENCODER_STEP: i32 = 4;

pub struct InputDecoder {
    event_tx: Sender<KontrolEvent>,
    main_encoder: u8,
    encoder_values: [u16; NUM_ENCODERS],
    button_bits: [u8; NUM_BUTTON_BYTES],
    main_touch_bits: u8,
    knob_touch_bits: u8,
    first_note: u8,
    primed: bool,
}

impl InputDecoder {
    pub fn new(event_tx: Sender<KontrolEvent>) -> Self {
        Self {
            event_tx,
            main_encoder: 0,
            encoder_values: [0; NUM_ENCODERS],
            button_bits: [0; NUM_BUTTON_BYTES],
            main_touch_bits: 0,
            knob_touch_bits: 0,
            first_note: 0,
            primed: false,
        }
    }

    /// The MIDI note currently mapped to the lowest physical key.
    pub fn first_note(&self) -> u8 {
        self.first_note
    }

    /// Clears all stored state, as after a reconnect. The next report is
    /// treated as the first one again.
    pub fn reset(&mut self) {
        let tx = self.event_tx.clone();
        *self = Self::new(tx);
    }

    /// Decodes one raw input report and emits events for every change.
    pub fn process_report(&mut self, data: &[u8]) {
        if data.len() < MIN_REPORT_LEN {
            log::warn!("dropping short input report ({} bytes)", data.len());
            return;
        }
        if data[0] != INPUT_REPORT_ID {
            log::debug!("ignoring report 0x{:02x}", data[0]);
            return;
        }

        let primed = self.primed;
        let mut encoder_change = false;

        let nibble = data[OFS_MAIN_ENCODER] & 0x0f;
        if nibble != self.main_encoder {
            let increased = wrap::main_encoder_increased(self.main_encoder, nibble);
            self.main_encoder = nibble;
            encoder_change = true;
            if primed {
                emit(&self.event_tx, KontrolEvent::MainEncoder { increased });
            }
        }

        for index in 0..NUM_ENCODERS {
            let ofs = OFS_ENCODERS + index * 2;
            let value = u16::from_le_bytes([data[ofs], data[ofs + 1]]);
            if value != self.encoder_values[index] {
                let delta = wrap::value_encoder_delta(self.encoder_values[index], value)
                    / ENCODER_STEP;
                self.encoder_values[index] = value;
                encoder_change = true;
                if primed {
                    emit(&self.event_tx, KontrolEvent::Encoder { index, delta });
                }
            }
        }

        for byte in 0..NUM_BUTTON_BYTES {
            emit_edges(
                &self.event_tx,
                &mut self.button_bits[byte],
                data[OFS_BUTTONS + byte],
                byte * 8,
            );
        }
        emit_edges(
            &self.event_tx,
            &mut self.main_touch_bits,
            data[OFS_MAIN_TOUCH],
            MAIN_TOUCH_BIT_BASE,
        );
        if !encoder_change {
            emit_edges(
                &self.event_tx,
                &mut self.knob_touch_bits,
                data[OFS_KNOB_TOUCH],
                KNOB_TOUCH_BIT_BASE,
            );
        }

        let first_note = data[OFS_FIRST_NOTE];
        if first_note != self.first_note {
            self.first_note = first_note;
            if primed {
                emit(&self.event_tx, KontrolEvent::Octave { first_note });
            }
        }

        self.primed = true;
    }
}

fn emit(tx: &Sender<KontrolEvent>, event: KontrolEvent) {
    if tx.try_send(event).is_err() {
        log::warn!("event channel full, dropping {event:?}");
    }
}

/// Emits edge events for every changed bit of a bitmask byte and stores
/// the new mask. Bits without an assigned button are skipped.
fn emit_edges(tx: &Sender<KontrolEvent>, stored: &mut u8, current: u8, bit_base: usize) {
    let changed = *stored ^ current;
    if changed == 0 {
        return;
    }
    for bit in 0..8 {
        let mask = 1u8 << bit;
        if changed & mask == 0 {
            continue;
        }
        let button: Option<Button> = num::FromPrimitive::from_usize(bit_base + bit);
        let Some(button) = button else { continue };
        emit(
            tx,
            KontrolEvent::Button {
                button,
                pressed: current & mask != 0,
            },
        );
    }
    *stored = current;
}

#[cfg(test)]
mod tests {
    use super::*;
    use flume::Receiver;

    fn decoder() -> (InputDecoder, Receiver<KontrolEvent>) {
        let (tx, rx) = flume::bounded(64);
        (InputDecoder::new(tx), rx)
    }

    fn report() -> [u8; 48] {
        let mut data = [0u8; 48];
        data[0] = INPUT_REPORT_ID;
        data
    }

    fn set_encoder(data: &mut [u8; 48], index: usize, value: u16) {
        let bytes = value.to_le_bytes();
        data[OFS_ENCODERS + index * 2] = bytes[0];
        data[OFS_ENCODERS + index * 2 + 1] = bytes[1];
    }

    fn drain(rx: &Receiver<KontrolEvent>) -> Vec<KontrolEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn first_report_emits_no_encoder_or_octave_events() {
        let (mut decoder, rx) = decoder();
        let mut data = report();
        data[OFS_MAIN_ENCODER] = 0x07;
        set_encoder(&mut data, 2, 500);
        data[OFS_FIRST_NOTE] = 48;
        decoder.process_report(&data);
        assert_eq!(drain(&rx), vec![]);
        assert_eq!(decoder.first_note(), 48);
    }

    #[test]
    fn buttons_held_at_startup_are_reported() {
        // Unlike encoders and the first note, button decoding has no
        // first-report exemption.
        let (mut decoder, rx) = decoder();
        let mut data = report();
        data[OFS_BUTTONS] = 0x01;
        decoder.process_report(&data);
        assert_eq!(
            drain(&rx),
            vec![KontrolEvent::Button { button: Button::Shift, pressed: true }]
        );
    }

    #[test]
    fn main_encoder_steps_and_wraps() {
        let (mut decoder, rx) = decoder();
        let mut data = report();
        data[OFS_MAIN_ENCODER] = 15;
        decoder.process_report(&data);
        drain(&rx);

        data[OFS_MAIN_ENCODER] = 0;
        decoder.process_report(&data);
        assert_eq!(drain(&rx), vec![KontrolEvent::MainEncoder { increased: true }]);

        data[OFS_MAIN_ENCODER] = 15;
        decoder.process_report(&data);
        assert_eq!(drain(&rx), vec![KontrolEvent::MainEncoder { increased: false }]);
    }

    #[test]
    fn main_encoder_nibble_ignores_the_high_bits() {
        let (mut decoder, rx) = decoder();
        decoder.process_report(&report());
        let mut data = report();
        data[OFS_MAIN_ENCODER] = 0xf0;
        decoder.process_report(&data);
        assert_eq!(drain(&rx), vec![]);
    }

    #[test]
    fn value_encoder_emits_quantized_deltas() {
        let (mut decoder, rx) = decoder();
        let mut data = report();
        set_encoder(&mut data, 0, 100);
        decoder.process_report(&data);
        drain(&rx);

        set_encoder(&mut data, 0, 108);
        decoder.process_report(&data);
        assert_eq!(drain(&rx), vec![KontrolEvent::Encoder { index: 0, delta: 2 }]);
    }

    #[test]
    fn value_encoder_wraps_across_zero() {
        let (mut decoder, rx) = decoder();
        let mut data = report();
        set_encoder(&mut data, 5, 998);
        decoder.process_report(&data);
        drain(&rx);

        set_encoder(&mut data, 5, 2);
        decoder.process_report(&data);
        assert_eq!(drain(&rx), vec![KontrolEvent::Encoder { index: 5, delta: 1 }]);

        set_encoder(&mut data, 5, 998);
        decoder.process_report(&data);
        assert_eq!(drain(&rx), vec![KontrolEvent::Encoder { index: 5, delta: -1 }]);
    }

    #[test]
    fn button_edges() {
        let (mut decoder, rx) = decoder();
        decoder.process_report(&report());

        let mut data = report();
        data[OFS_BUTTONS] = 0x40; // bit 6: Play
        decoder.process_report(&data);
        assert_eq!(
            drain(&rx),
            vec![KontrolEvent::Button { button: Button::Play, pressed: true }]
        );

        // Holding produces nothing further.
        decoder.process_report(&data);
        assert_eq!(drain(&rx), vec![]);

        decoder.process_report(&report());
        assert_eq!(
            drain(&rx),
            vec![KontrolEvent::Button { button: Button::Play, pressed: false }]
        );
    }

    #[test]
    fn buttons_in_all_three_bitmask_bytes() {
        let (mut decoder, rx) = decoder();
        decoder.process_report(&report());

        let mut data = report();
        data[OFS_BUTTONS + 1] = 0x01; // bit 8: Stop
        data[OFS_BUTTONS + 2] = 0x20; // bit 21: MainEncoderPush
        decoder.process_report(&data);
        let events = drain(&rx);
        assert!(events.contains(&KontrolEvent::Button { button: Button::Stop, pressed: true }));
        assert!(events.contains(&KontrolEvent::Button {
            button: Button::MainEncoderPush,
            pressed: true
        }));
    }

    #[test]
    fn unassigned_bits_emit_nothing() {
        let (mut decoder, rx) = decoder();
        decoder.process_report(&report());
        let mut data = report();
        data[OFS_BUTTONS + 2] = 0xc0; // bits 22 and 23 have no button
        decoder.process_report(&data);
        assert_eq!(drain(&rx), vec![]);
    }

    #[test]
    fn knob_touch_is_suppressed_on_encoder_frames() {
        let (mut decoder, rx) = decoder();
        let mut data = report();
        set_encoder(&mut data, 0, 100);
        decoder.process_report(&data);
        drain(&rx);

        // Encoder moves and the touch sensor fires in the same frame.
        set_encoder(&mut data, 0, 104);
        data[OFS_KNOB_TOUCH] = 0x01;
        decoder.process_report(&data);
        assert_eq!(drain(&rx), vec![KontrolEvent::Encoder { index: 0, delta: 1 }]);

        // The touch is still held on the next quiet frame and surfaces now.
        decoder.process_report(&data);
        assert_eq!(
            drain(&rx),
            vec![KontrolEvent::Button { button: Button::KnobTouch1, pressed: true }]
        );
    }

    #[test]
    fn main_touch_is_decoded_even_on_encoder_frames() {
        let (mut decoder, rx) = decoder();
        let mut data = report();
        decoder.process_report(&data);

        data[OFS_MAIN_ENCODER] = 0x01;
        data[OFS_MAIN_TOUCH] = 0x01;
        decoder.process_report(&data);
        let events = drain(&rx);
        assert!(events.contains(&KontrolEvent::MainEncoder { increased: true }));
        assert!(events.contains(&KontrolEvent::Button {
            button: Button::MainEncoderTouch,
            pressed: true
        }));
    }

    #[test]
    fn octave_changes_after_the_first_report() {
        let (mut decoder, rx) = decoder();
        let mut data = report();
        data[OFS_FIRST_NOTE] = 48;
        decoder.process_report(&data);
        drain(&rx);

        data[OFS_FIRST_NOTE] = 36;
        decoder.process_report(&data);
        assert_eq!(drain(&rx), vec![KontrolEvent::Octave { first_note: 36 }]);
        assert_eq!(decoder.first_note(), 36);
    }

    #[test]
    fn short_reports_are_dropped() {
        let (mut decoder, rx) = decoder();
        decoder.process_report(&report());
        let mut data = report();
        data[OFS_MAIN_ENCODER] = 0x03;
        decoder.process_report(&data[..36]);
        assert_eq!(drain(&rx), vec![]);
        // The truncated report also left no state behind.
        decoder.process_report(&data);
        assert_eq!(drain(&rx), vec![KontrolEvent::MainEncoder { increased: true }]);
    }

    #[test]
    fn foreign_report_ids_are_ignored() {
        let (mut decoder, rx) = decoder();
        decoder.process_report(&report());
        let mut data = report();
        data[0] = 0x02;
        data[OFS_BUTTONS] = 0xff;
        decoder.process_report(&data);
        assert_eq!(drain(&rx), vec![]);
    }

    #[test]
    fn reset_reprimes_the_decoder() {
        let (mut decoder, rx) = decoder();
        let mut data = report();
        data[OFS_MAIN_ENCODER] = 0x09;
        decoder.process_report(&data);
        decoder.process_report(&report());
        drain(&rx);

        decoder.reset();
        // The report right after a reset is a baseline again.
        decoder.process_report(&data);
        assert_eq!(drain(&rx), vec![]);
    }

    #[test]
    fn zero_quantized_delta_still_emits() {
        let (mut decoder, rx) = decoder();
        let mut data = report();
        set_encoder(&mut data, 1, 100);
        decoder.process_report(&data);
        drain(&rx);

        set_encoder(&mut data, 1, 102);
        decoder.process_report(&data);
        assert_eq!(drain(&rx), vec![KontrolEvent::Encoder { index: 1, delta: 0 }]);
    }
}
