use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ThemePreset {
    #[default]
    Default,
    Dark,
    Minimal,
    Sunset,
    Ocean,
    Forest,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ButtonStyle {
    #[default]
    Rounded,
    Pill,
    Square,
    Outline,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Font {
    #[default]
    Inter,
    Roboto,
    Poppins,
    Merriweather,
    SpaceMono,
}

/// Colors of a preset, lower-case `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: &'static str,
    pub text: &'static str,
    pub button: &'static str,
    pub button_text: &'static str,
}

impl ThemePreset {
    pub fn palette(&self) -> Palette {
        match self {
            ThemePreset::Default => Palette {
                background: "#ffffff",
                text: "#111111",
                button: "#111111",
                button_text: "#ffffff",
            },
            ThemePreset::Dark => Palette {
                background: "#0f0f10",
                text: "#f5f5f5",
                button: "#2a2a2e",
                button_text: "#f5f5f5",
            },
            ThemePreset::Minimal => Palette {
                background: "#fafafa",
                text: "#333333",
                button: "#ffffff",
                button_text: "#333333",
            },
            ThemePreset::Sunset => Palette {
                background: "#ff7e5f",
                text: "#ffffff",
                button: "#feb47b",
                button_text: "#4a1c0c",
            },
            ThemePreset::Ocean => Palette {
                background: "#0b3d91",
                text: "#e6f1ff",
                button: "#1e88e5",
                button_text: "#ffffff",
            },
            ThemePreset::Forest => Palette {
                background: "#1b4332",
                text: "#d8f3dc",
                button: "#40916c",
                button_text: "#ffffff",
            },
        }
    }

    pub fn is_premium(&self) -> bool {
        matches!(
            self,
            ThemePreset::Sunset | ThemePreset::Ocean | ThemePreset::Forest
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub preset: ThemePreset,
    pub background_color: String,
    pub text_color: String,
    pub button_color: String,
    pub button_text_color: String,
    pub button_style: ButtonStyle,
    pub font: Font,
}

impl Theme {
    pub fn from_preset(preset: ThemePreset) -> Self {
        let palette = preset.palette();
        Self {
            preset,
            background_color: palette.background.to_string(),
            text_color: palette.text.to_string(),
            button_color: palette.button.to_string(),
            button_text_color: palette.button_text.to_string(),
            button_style: ButtonStyle::default(),
            font: Font::default(),
        }
    }

    /// True when any color differs from the preset's own palette.
    pub fn has_custom_colors(&self) -> bool {
        let palette = self.preset.palette();
        self.background_color != palette.background
            || self.text_color != palette.text
            || self.button_color != palette.button
            || self.button_text_color != palette.button_text
    }

    pub fn requires_premium(&self) -> bool {
        self.preset.is_premium() || self.has_custom_colors()
    }
}

impl Default for Theme {
    fn default() -> Self {
        Theme::from_preset(ThemePreset::Default)
    }
}

/// Normalizes `#RGB` / `#RRGGBB` (any case) to lower-case `#rrggbb`.
pub fn normalize_hex_color(input: &str) -> Option<String> {
    let hex = input.trim().strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let hex = hex.to_ascii_lowercase();
    match hex.len() {
        6 => Some(format!("#{hex}")),
        3 => {
            let expanded: String = hex.chars().flat_map(|c| [c, c]).collect();
            Some(format!("#{expanded}"))
        }
        _ => None,
    }
}
