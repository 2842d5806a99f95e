//! Label and color value types.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationError;
use crate::constants::{MAX_CLASS_CODE, NEUTRAL_CLASS_CODE};

/// Discrete class value stored per element in the annotation buffer.
pub type ClassCode = u16;

/// Shared handle to a label. Labels are compared by identity.
pub type LabelRef = Rc<Label>;

/// Alpha channel used by the float representation.
pub const DEFAULT_ALPHA_VALUE: u8 = 0;

/// A 24-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Create a color from wider integer components, failing outside 0..=255.
    pub fn try_from_components(red: i64, green: i64, blue: i64) -> Result<Self, AnnotationError> {
        let channel = |value: i64| {
            u8::try_from(value).map_err(|_| AnnotationError::InvalidColor {
                value: value.to_string(),
                reason: if value < 0 {
                    "component is negative".to_string()
                } else {
                    "component is greater than 255".to_string()
                },
            })
        };
        Ok(Self::new(channel(red)?, channel(green)?, channel(blue)?))
    }

    /// Decode a `0xRRGGBB` packed color. Bits above 24 are ignored.
    pub fn from_number(number: u32) -> Self {
        Self::new(
            ((number & 0xff0000) >> 16) as u8,
            ((number & 0x00ff00) >> 8) as u8,
            (number & 0x0000ff) as u8,
        )
    }

    /// Parse an HTML color code such as `#ff8800`.
    pub fn from_html_code(code: &str) -> Result<Self, AnnotationError> {
        let invalid = |reason: &str| AnnotationError::InvalidColor {
            value: code.to_string(),
            reason: reason.to_string(),
        };
        let hex = code
            .strip_prefix('#')
            .ok_or_else(|| invalid("missing leading '#'"))?;
        if hex.len() != 6 {
            return Err(invalid("expected six hex digits"));
        }
        let number = u32::from_str_radix(hex, 16).map_err(|_| invalid("not a hex number"))?;
        Ok(Self::from_number(number))
    }

    /// Pack as `0xRRGGBB`.
    pub fn as_number(&self) -> u32 {
        ((self.red as u32) << 16) + ((self.green as u32) << 8) + self.blue as u32
    }

    /// Lowercase HTML color code, e.g. `#0a0b0c`.
    pub fn as_html_code(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }

    /// RGBA in 0.0..=1.0, alpha set to [`DEFAULT_ALPHA_VALUE`].
    pub fn as_float_rgba(&self) -> [f32; 4] {
        [
            self.red as f32 / 255.0,
            self.green as f32 / 255.0,
            self.blue as f32 / 255.0,
            DEFAULT_ALPHA_VALUE as f32 / 255.0,
        ]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_html_code())
    }
}

/// An annotation label.
///
/// The descriptive fields are immutable; visibility and lock state are
/// per-session flags that can change while the label is shared.
#[derive(Debug)]
pub struct Label {
    /// Unique identifier for the label
    pub id: u32,
    class_code: ClassCode,
    /// Display name of the label
    pub name: String,
    /// Display color of the label
    pub color: Color,
    visible: Cell<bool>,
    locked: Cell<bool>,
}

impl Label {
    /// Create a new label. Codes above [`MAX_CLASS_CODE`] are reserved.
    pub fn new(id: u32, class_code: u32, name: &str, color: Color) -> Result<Self, AnnotationError> {
        let class_code = ClassCode::try_from(class_code)
            .ok()
            .filter(|&code| code <= MAX_CLASS_CODE)
            .ok_or(AnnotationError::ClassCodeOutOfBounds(class_code))?;
        Ok(Self {
            id,
            class_code,
            name: name.to_string(),
            color,
            visible: Cell::new(true),
            locked: Cell::new(false),
        })
    }

    fn neutral() -> Self {
        Self {
            id: 0,
            class_code: NEUTRAL_CLASS_CODE,
            name: "neutralLabel".to_string(),
            color: Color::new(0, 0, 0),
            visible: Cell::new(true),
            locked: Cell::new(false),
        }
    }

    pub fn class_code(&self) -> ClassCode {
        self.class_code
    }

    pub fn is_neutral(&self) -> bool {
        self.class_code == NEUTRAL_CLASS_CODE
    }

    pub fn is_visible(&self) -> bool {
        self.visible.get()
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.set(visible);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }

    pub fn set_locked(&self, locked: bool) {
        self.locked.set(locked);
    }
}

thread_local! {
    static NEUTRAL_LABEL: LabelRef = Rc::new(Label::neutral());
}

/// The shared neutral (eraser) label.
///
/// Every call on the same thread returns the same instance.
pub fn neutral_label() -> LabelRef {
    NEUTRAL_LABEL.with(Rc::clone)
}

/// Serializable description of a label, as found in label set files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDescriptor {
    pub id: u32,
    pub class_code: u32,
    pub name: String,
    /// HTML color code, e.g. `#ff0000`
    pub color: String,
}

impl LabelDescriptor {
    pub fn to_label(&self) -> Result<LabelRef, AnnotationError> {
        let color = Color::from_html_code(&self.color)?;
        Ok(Rc::new(Label::new(self.id, self.class_code, &self.name, color)?))
    }
}

impl From<&Label> for LabelDescriptor {
    fn from(label: &Label) -> Self {
        Self {
            id: label.id,
            class_code: label.class_code as u32,
            name: label.name.clone(),
            color: label.color.as_html_code(),
        }
    }
}

/// Parse a JSON array of [`LabelDescriptor`]s into labels.
pub fn labels_from_json(json: &str) -> Result<Vec<LabelRef>, AnnotationError> {
    let descriptors: Vec<LabelDescriptor> =
        serde_json::from_str(json).map_err(|e| AnnotationError::InvalidLabelSet(e.to_string()))?;
    descriptors.iter().map(LabelDescriptor::to_label).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_number_round_trip() {
        let color = Color::new(0x12, 0xab, 0x07);
        assert_eq!(color.as_number(), 0x12ab07);
        assert_eq!(Color::from_number(0xff12ab07), color);
    }

    #[test]
    fn test_color_html_code() {
        let color = Color::from_html_code("#0a0b0c").unwrap();
        assert_eq!(color, Color::new(10, 11, 12));
        assert_eq!(color.as_html_code(), "#0a0b0c");
        assert!(Color::from_html_code("0a0b0c").is_err());
        assert!(Color::from_html_code("#0a0b").is_err());
        assert!(Color::from_html_code("#zzzzzz").is_err());
    }

    #[test]
    fn test_color_component_range() {
        assert!(Color::try_from_components(0, 255, 12).is_ok());
        assert!(Color::try_from_components(-1, 0, 0).is_err());
        assert!(Color::try_from_components(0, 256, 0).is_err());
    }

    #[test]
    fn test_color_float_values() {
        let rgba = Color::new(255, 0, 51).as_float_rgba();
        assert_eq!(rgba[0], 1.0);
        assert_eq!(rgba[1], 0.0);
        assert!((rgba[2] - 0.2).abs() < 1e-6);
        assert_eq!(rgba[3], 0.0);
    }

    #[test]
    fn test_label_class_code_bounds() {
        assert!(Label::new(1, MAX_CLASS_CODE as u32, "last", Color::default()).is_ok());
        assert!(Label::new(1, MAX_CLASS_CODE as u32 + 1, "reserved", Color::default()).is_err());
        assert!(Label::new(1, 65536, "too big", Color::default()).is_err());
    }

    #[test]
    fn test_reserved_codes_are_not_constructible() {
        use crate::constants::NOT_CAPTURED_CLASS_CODE;

        assert!(matches!(
            Label::new(1, NOT_CAPTURED_CLASS_CODE as u32, "sentinel", Color::default()),
            Err(AnnotationError::ClassCodeOutOfBounds(65534))
        ));
        assert!(Label::new(1, NEUTRAL_CLASS_CODE as u32, "eraser", Color::default()).is_err());
        assert!(neutral_label().is_neutral());
    }

    #[test]
    fn test_label_flags() {
        let label = Label::new(1, 3, "tree", Color::new(0, 255, 0)).unwrap();
        assert!(label.is_visible());
        assert!(!label.is_locked());
        label.set_locked(true);
        label.set_visible(false);
        assert!(label.is_locked());
        assert!(!label.is_visible());
        assert!(!label.is_neutral());
    }

    #[test]
    fn test_neutral_label_is_shared() {
        let a = neutral_label();
        let b = neutral_label();
        assert!(Rc::ptr_eq(&a, &b));
        assert!(a.is_neutral());
        assert_eq!(a.class_code(), NEUTRAL_CLASS_CODE);
    }

    #[test]
    fn test_labels_from_json() {
        let json = r##"[
            {"id": 1, "class_code": 0, "name": "ground", "color": "#804000"},
            {"id": 2, "class_code": 1, "name": "tree", "color": "#00ff00"}
        ]"##;
        let labels = labels_from_json(json).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[1].name, "tree");
        assert_eq!(labels[1].color, Color::new(0, 255, 0));
        assert_eq!(LabelDescriptor::from(labels[0].as_ref()).color, "#804000");

        assert!(labels_from_json("not json").is_err());
    }
}
