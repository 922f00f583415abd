//! Button identities and their wire positions.
//!
//! The discriminant of each variant is its bit index in the input report:
//! bits 0..=23 map onto the three button-bitmask bytes, bit 24 onto the
//! main-touch byte and bits 32..=39 onto the knob-touch byte. The decoder
//! recovers variants from bit indices via `FromPrimitive`, unassigned bits
//! simply yield `None`.

use num_derive::FromPrimitive;

/// Number of button LED slots in the 0x80 output report.
pub const NUM_BUTTON_LEDS: usize = 21;

/// Bit index of the main-encoder touch sensor.
pub const MAIN_TOUCH_BIT_BASE: usize = 24;

/// Bit index of the first knob touch sensor.
pub const KNOB_TOUCH_BIT_BASE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum Button {
    // Bitmask byte 0
    Shift,
    Scale,
    Arp,
    Loop,
    Rwd,
    Ffw,
    Play,
    Rec,
    // Bitmask byte 1
    Stop,
    PageLeft,
    PageRight,
    Browse,
    Instance,
    OctaveDown,
    OctaveUp,
    Enter,
    // Bitmask byte 2 (bits 22 and 23 are unassigned)
    Back,
    NavLeft,
    NavRight,
    NavUp,
    NavDown,
    MainEncoderPush,
    // Main-touch byte
    MainEncoderTouch = 24,
    // Knob-touch byte
    KnobTouch1 = 32,
    KnobTouch2,
    KnobTouch3,
    KnobTouch4,
    KnobTouch5,
    KnobTouch6,
    KnobTouch7,
    KnobTouch8,
}

impl Button {
    /// LED slot of this button in the 0x80 report payload. The encoder push
    /// and the touch sensors have no LED.
    pub fn led_slot(self) -> Option<usize> {
        let idx = self as usize;
        if idx < NUM_BUTTON_LEDS { Some(idx) } else { None }
    }

    /// Short display label, sized for one 8-character block.
    pub fn label(self) -> &'static str {
        match self {
            Button::Shift => "SHIFT",
            Button::Scale => "SCALE",
            Button::Arp => "ARP",
            Button::Loop => "LOOP",
            Button::Rwd => "RWD",
            Button::Ffw => "FFW",
            Button::Play => "PLAY",
            Button::Rec => "REC",
            Button::Stop => "STOP",
            Button::PageLeft => "PAGE-",
            Button::PageRight => "PAGE+",
            Button::Browse => "BROWSE",
            Button::Instance => "INST",
            Button::OctaveDown => "OCT-",
            Button::OctaveUp => "OCT+",
            Button::Enter => "ENTER",
            Button::Back => "BACK",
            Button::NavLeft => "NAV<",
            Button::NavRight => "NAV>",
            Button::NavUp => "NAVUP",
            Button::NavDown => "NAVDN",
            Button::MainEncoderPush => "PUSH",
            Button::MainEncoderTouch => "TOUCH",
            Button::KnobTouch1 => "KNOB1",
            Button::KnobTouch2 => "KNOB2",
            Button::KnobTouch3 => "KNOB3",
            Button::KnobTouch4 => "KNOB4",
            Button::KnobTouch5 => "KNOB5",
            Button::KnobTouch6 => "KNOB6",
            Button::KnobTouch7 => "KNOB7",
            Button::KnobTouch8 => "KNOB8",
        }
    }
}
