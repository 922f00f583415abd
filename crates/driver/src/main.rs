mod settings;

use crate::self_test::self_test;
use crate::settings::Settings;
use clap::Parser;
use config::Config;
use flume::Receiver;
use hidapi::HidResult;
use kontrol_library::controls::{Button, NUM_BUTTON_LEDS};
use kontrol_library::device::DeviceState;
use kontrol_library::display::NUM_COLUMNS;
use kontrol_library::events::KontrolEvent;
use kontrol_library::input::{InputDecoder, NUM_ENCODERS};
use kontrol_library::keymap;
use kontrol_library::port::UsbConnection;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const VENDOR_ID: u16 = 0x17cc;

// Until the device reports its transpose, assume the window starts at C2.
const DEFAULT_FIRST_NOTE: u8 = 48;

// Demo surface ranges: the eight knob bars run 0..=100, the main encoder
// position runs over the pan indicator's 17 steps.
const BAR_RANGE: i32 = 100;
const MAIN_RANGE: i32 = 16;
const MAIN_PAN_COLUMN: usize = 8;

#[derive(Parser, Debug)]
#[clap(
    name = "Kontrol keyboard userspace driver",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Args {
    #[clap(short, long, help = "Config file (see example_config.toml)")]
    config: Option<String>,

    #[clap(short, long, help = "Print text on the display and exit (slides if wider than one row)")]
    text: Option<String>,
}

fn main() -> HidResult<()> {
    env_logger::init();
    let args = Args::parse();

    let mut cfg = Config::builder();
    if let Some(config_fn) = args.config {
        cfg = cfg.add_source(config::File::with_name(config_fn.as_str()));
    }
    let cfg = cfg.build().expect("Can't create settings");
    let settings: Settings = cfg.try_deserialize().expect("Can't parse settings");
    settings.validate().unwrap();

    println!("Running with settings:");
    println!("{settings:?}");

    let (product_id, num_keys) = settings.model_spec();
    let api = hidapi::HidApi::new()?;
    let port = UsbConnection::open(&api, VENDOR_ID, product_id);
    if !port.is_connected() {
        eprintln!("Device not found, continuing against the disconnected stub");
    }

    let state = Arc::new(DeviceState::new(num_keys));
    state.send_init(&port)?;

    // One-shot text mode needs no input handling
    if let Some(text) = args.text {
        display_text(&port, &state, &text)?;
        state.shutdown(&port);
        return Ok(());
    }

    self_test(&port, &state)?;

    let (event_tx, event_rx) = flume::bounded(256);
    let decoder = InputDecoder::new(event_tx);

    let consumer_state = Arc::clone(&state);
    let consumer_settings = settings.clone();
    thread::spawn(move || consume_events(event_rx, consumer_state, consumer_settings));

    main_loop(&port, &state, decoder);

    // The loop only returns when the transport failed; blank what we can.
    state.shutdown(&port);
    Ok(())
}

/// Display text on the top row, sliding it when it does not fit
fn display_text(port: &UsbConnection, state: &DeviceState, text: &str) -> HidResult<()> {
    if text.chars().count() <= NUM_COLUMNS {
        {
            let mut display = state.display.lock().unwrap();
            display.set_row_text(0, text);
        }
        state.flush(port)?;

        println!("Displaying text: {text}");
        thread::sleep(Duration::from_secs(3));
    } else {
        println!("Sliding text: {text}");

        let chars: Vec<char> = text.chars().collect();
        for offset in 0..chars.len() {
            let window: String = chars[offset..].iter().collect();
            {
                let mut display = state.display.lock().unwrap();
                display.set_row_text(0, &window);
            }
            state.flush(port)?;
            thread::sleep(Duration::from_millis(120));
        }
    }

    Ok(())
}

/// Reads input reports and flushes dirty output state, both on the thread
/// that owns the HID handle. Returns when the transport fails.
fn main_loop(port: &UsbConnection, state: &DeviceState, mut decoder: InputDecoder) {
    let mut buf = [0u8; 64];
    loop {
        match port.read_timeout(&mut buf, 1) {
            Ok(size) if size > 0 => decoder.process_report(&buf[..size]),
            Ok(_) => {
                // The stub returns instantly; avoid a hot spin without a device.
                if !port.is_connected() {
                    thread::sleep(Duration::from_millis(1));
                }
            }
            Err(e) => {
                log::error!("read failed: {e}");
                return;
            }
        }

        if let Err(e) = state.flush(port) {
            log::error!("write failed: {e}");
            return;
        }
    }
}

/// Repaints the shared output state from decoded events. Runs on its own
/// thread; each resource is locked only for the touched update.
fn consume_events(events: Receiver<KontrolEvent>, state: Arc<DeviceState>, settings: Settings) {
    let mut bar_values = [BAR_RANGE / 2; NUM_ENCODERS];
    let mut main_position = MAIN_RANGE / 2;
    let mut first_note = DEFAULT_FIRST_NOTE;

    paint_idle(&state, &settings, first_note, &bar_values, main_position);

    while let Ok(event) = events.recv() {
        match event {
            KontrolEvent::Button { button, pressed } => {
                let level = if pressed { 255 } else { settings.backlight_intensity };
                state.button_lights.lock().unwrap().set(button, level);
                if pressed {
                    let mut display = state.display.lock().unwrap();
                    display.set_row_text(1, button.label());
                    println!("Button {button:?} pressed");
                }
            }
            KontrolEvent::Encoder { index, delta } => {
                bar_values[index] = (bar_values[index] + delta).clamp(0, BAR_RANGE);
                let mut display = state.display.lock().unwrap();
                display.set_bar(index, true, bar_values[index] as u32, BAR_RANGE as u32);
                display.set_row_text(1, &format!("KNOB {} {}%", index + 1, bar_values[index]));
            }
            KontrolEvent::MainEncoder { increased } => {
                let step = if increased { 1 } else { -1 };
                main_position = (main_position + step).clamp(0, MAIN_RANGE);
                let mut display = state.display.lock().unwrap();
                display.set_pan_bar(MAIN_PAN_COLUMN, false, main_position as u32, MAIN_RANGE as u32);
                display.set_row_text(1, &format!("MAIN {main_position}"));
            }
            KontrolEvent::Octave { first_note: note } => {
                first_note = note;
                {
                    let mut display = state.display.lock().unwrap();
                    display.set_row_text(1, &format!("FIRST NOTE {first_note}"));
                }
                if settings.light_guide {
                    paint_light_guide(&state, &settings, first_note);
                }
                println!("Transpose, first note now {first_note}");
            }
        }
    }
}

fn paint_idle(
    state: &DeviceState,
    settings: &Settings,
    first_note: u8,
    bar_values: &[i32; NUM_ENCODERS],
    main_position: i32,
) {
    {
        let mut display = state.display.lock().unwrap();
        display.set_row_text(0, "KONTROL READY");
        for (index, value) in bar_values.iter().enumerate() {
            display.set_bar(index, true, *value as u32, BAR_RANGE as u32);
        }
        display.set_pan_bar(MAIN_PAN_COLUMN, false, main_position as u32, MAIN_RANGE as u32);
    }
    {
        let mut buttons = state.button_lights.lock().unwrap();
        for idx in 0..NUM_BUTTON_LEDS {
            let button: Option<Button> = num::FromPrimitive::from_usize(idx);
            let Some(button) = button else { continue };
            buttons.set(button, settings.backlight_intensity);
        }
    }
    if settings.light_guide {
        paint_light_guide(state, settings, first_note);
    }
}

/// Lights the visible key window, with the octave roots accented
fn paint_light_guide(state: &DeviceState, settings: &Settings, first_note: u8) {
    let mut keys = state.key_lights.lock().unwrap();
    let num_keys = keys.num_keys();
    keys.clear();
    for key in 0..num_keys {
        let Some(note) = keymap::to_absolute_note(first_note, key) else {
            continue;
        };
        let color = if note % 12 == 0 {
            &settings.root_key_color
        } else {
            &settings.key_color
        };
        keys.set_key(key, color[0], color[1], color[2]);
    }
}
