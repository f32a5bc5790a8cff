use serde_json::Value;

/// Twips per pixel at 96 dpi (1440 twips/inch / 96 px/inch).
const TWIPS_PER_PIXEL: u32 = 15;

/// Convert a pixel measurement to twips, the unit WordprocessingML uses for
/// most widths. Saturates instead of wrapping on oversized input.
pub fn px_to_twip(px: u32) -> u32 {
    px.saturating_mul(TWIPS_PER_PIXEL)
}

/// Horizontal alignment vocabulary understood by the template config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
}

impl Alignment {
    /// Translate a human alignment name. Case-insensitive; anything
    /// unrecognized (including the empty string) maps to `Center`.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "left" => Alignment::Left,
            "center" => Alignment::Center,
            "right" => Alignment::Right,
            _ => Alignment::Center,
        }
    }
}

/// Text style options copied from configuration. Absent fields stay unset
/// so the document writer applies its own defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextStyle {
    pub size: Option<u64>,
    pub color: Option<String>,
    pub bold: bool,
    pub italic: bool,
}

impl TextStyle {
    /// Build a style from a config subtree. Only the recognized keys
    /// `size`, `color`, `bold`, `italic` are copied; `bold`/`italic` only
    /// when present and true.
    pub fn from_value(style: Option<&Value>) -> Self {
        let Some(Value::Object(map)) = style else {
            return Self::default();
        };
        Self {
            size: map.get("size").and_then(Value::as_u64),
            color: map
                .get("color")
                .and_then(Value::as_str)
                .map(str::to_string),
            bold: map.get("bold").and_then(Value::as_bool).unwrap_or(false),
            italic: map.get("italic").and_then(Value::as_bool).unwrap_or(false),
        }
    }
}
