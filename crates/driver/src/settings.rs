use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub(crate) struct Settings {
    /// Keyboard model, decides the product id and key count.
    /// Valid values: "s25", "s49", "s61", "s88".
    pub model: String,
    /// Repaint the key light guide whenever the octave changes.
    pub light_guide: bool,
    /// Light guide color as [r, g, b], each 0 to 127.
    pub key_color: Vec<u8>,
    /// Accent color for the root key of each octave.
    pub root_key_color: Vec<u8>,
    /// Idle LED level for buttons so the panel stays readable in the dark.
    /// 0 turns the backlight off.
    pub backlight_intensity: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: "s61".to_string(),
            light_guide: true,
            key_color: vec![0, 30, 70],
            root_key_color: vec![70, 16, 0],
            backlight_intensity: 8,
        }
    }
}

impl Settings {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.model_spec_opt().is_none() {
            return Err(format!(
                "Unknown model {:?} (expected: \"s25\", \"s49\", \"s61\", \"s88\")",
                self.model
            ));
        }

        for (name, color) in [
            ("key_color", &self.key_color),
            ("root_key_color", &self.root_key_color),
        ] {
            if color.len() != 3 {
                return Err(format!("{name} must be three values [r, g, b]"));
            }
            if color.iter().any(|c| *c > 127) {
                return Err(format!("{name} channels must be 0 to 127"));
            }
        }

        Ok(())
    }

    /// Product id and key count for the configured model.
    pub(crate) fn model_spec(&self) -> (u16, usize) {
        self.model_spec_opt().expect("validate() accepted the model")
    }

    fn model_spec_opt(&self) -> Option<(u16, usize)> {
        match self.model.trim().to_ascii_lowercase().as_str() {
            "s25" => Some((0x1340, 25)),
            "s49" => Some((0x1350, 49)),
            "s61" => Some((0x1360, 61)),
            "s88" => Some((0x1410, 88)),
            _ => None,
        }
    }
}
