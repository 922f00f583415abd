//! Driver layer for the Kontrol keyboard controller family.
//!
//! Decodes the proprietary HID input reports into button, encoder and
//! transpose events, and encodes display text, bar graphs and LED state
//! into the device's output reports with differential updates.

pub mod controls;
pub mod device;
pub mod display;
pub mod events;
pub mod glyphs;
pub mod input;
pub mod keymap;
pub mod lights;
pub mod port;
pub mod wrap;
