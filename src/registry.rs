//! Field Type Registry
//!
//! Maps a field's kind onto the input control that renders it, together with
//! the attributes that control needs. Kinds this build does not know resolve
//! to an inert placeholder instead of failing.

use serde::Serialize;
use serde_json::Value;

use crate::domain::{
    ChoiceAttrs, DateAttrs, FieldDefinition, FieldKind, FileAttrs, LocationAttrs, NumberAttrs,
    SectionAttrs, SignatureAttrs, TextAreaAttrs, TextAttrs,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
    Text,
    Email,
    Tel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DateMode {
    Date,
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChoiceStyle {
    Dropdown,
    Radio,
    Checkbox,
    Multiselect,
}

/// Input control resolved for a field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "control", rename_all = "camelCase")]
pub enum Control {
    TextInput { mode: TextMode, attrs: TextAttrs },
    TextArea { attrs: TextAreaAttrs },
    NumberInput { attrs: NumberAttrs },
    DateTime { mode: DateMode, attrs: DateAttrs },
    SingleChoice { style: ChoiceStyle, attrs: ChoiceAttrs },
    MultiChoice { style: ChoiceStyle, attrs: ChoiceAttrs },
    FileUpload { images_only: bool, attrs: FileAttrs },
    SignaturePad { attrs: SignatureAttrs },
    LocationPicker { attrs: LocationAttrs },
    /// Section or heading text; holds no answer
    Static { heading: bool, attrs: SectionAttrs },
    /// Unknown kind, shown as a notice
    Placeholder { type_name: String },
}

impl Control {
    /// Controls that collect an answer
    pub fn accepts_input(&self) -> bool {
        !matches!(self, Control::Static { .. } | Control::Placeholder { .. })
    }
}

/// Resolve the control for a field kind
pub fn resolve(kind: &FieldKind) -> Control {
    match kind {
        FieldKind::Text(attrs) => Control::TextInput { mode: TextMode::Text, attrs: attrs.clone() },
        FieldKind::Email(attrs) => Control::TextInput { mode: TextMode::Email, attrs: attrs.clone() },
        FieldKind::Phone(attrs) => Control::TextInput { mode: TextMode::Tel, attrs: attrs.clone() },
        FieldKind::Textarea(attrs) => Control::TextArea { attrs: attrs.clone() },
        FieldKind::Number(attrs) => Control::NumberInput { attrs: attrs.clone() },
        FieldKind::Date(attrs) => Control::DateTime { mode: DateMode::Date, attrs: attrs.clone() },
        FieldKind::Time(attrs) => Control::DateTime { mode: DateMode::Time, attrs: attrs.clone() },
        FieldKind::Select(attrs) => Control::SingleChoice { style: ChoiceStyle::Dropdown, attrs: attrs.clone() },
        FieldKind::Radio(attrs) => Control::SingleChoice { style: ChoiceStyle::Radio, attrs: attrs.clone() },
        FieldKind::Checkbox(attrs) => Control::MultiChoice { style: ChoiceStyle::Checkbox, attrs: attrs.clone() },
        FieldKind::Multiselect(attrs) => {
            Control::MultiChoice { style: ChoiceStyle::Multiselect, attrs: attrs.clone() }
        }
        FieldKind::File(attrs) => Control::FileUpload { images_only: false, attrs: attrs.clone() },
        FieldKind::Image(attrs) => Control::FileUpload { images_only: true, attrs: attrs.clone() },
        FieldKind::Signature(attrs) => Control::SignaturePad { attrs: attrs.clone() },
        FieldKind::Location(attrs) => Control::LocationPicker { attrs: attrs.clone() },
        FieldKind::Section(attrs) => Control::Static { heading: false, attrs: attrs.clone() },
        FieldKind::Heading(attrs) => Control::Static { heading: true, attrs: attrs.clone() },
        FieldKind::Unknown { type_name, .. } => Control::Placeholder { type_name: type_name.clone() },
    }
}

/// Everything a presentation layer needs to draw one field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub name: String,
    pub label: String,
    pub required: bool,
    pub help_text: Option<String>,
    pub control: Control,
    pub value: Option<Value>,
    pub error: Option<String>,
    pub read_only: bool,
    /// Shown instead of an input for unknown kinds
    pub notice: Option<String>,
}

/// Build the view of a field from its current answer and error
pub fn render(field: &FieldDefinition, value: Option<&Value>, error: Option<&str>, read_only: bool) -> FieldView {
    let control = resolve(&field.kind);
    let notice = match &control {
        Control::Placeholder { type_name } => {
            Some(format!("This field type ({}) will be implemented soon.", type_name))
        }
        _ => None,
    };
    let value = if control.accepts_input() {
        value.cloned().or_else(|| field.default_value.clone())
    } else {
        None
    };

    FieldView {
        name: field.name.clone(),
        label: field.label.clone(),
        required: field.required && control.accepts_input(),
        help_text: field.help_text.clone(),
        control,
        value,
        error: error.map(str::to_string),
        read_only,
        notice,
    }
}

/// Selected option values of a choice answer; a single string counts as one
pub fn selected_values(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Metadata of a file picked for a file or image field
#[derive(Debug, Clone, PartialEq)]
pub struct FileMeta {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

/// Check picked files against the field's limits
pub fn check_upload(field: &FieldDefinition, files: &[FileMeta]) -> Result<(), String> {
    let (attrs, images_only) = match &field.kind {
        FieldKind::File(attrs) => (attrs, false),
        FieldKind::Image(attrs) => (attrs, true),
        _ => return Err(format!("{} does not accept files", field.label)),
    };

    if files.len() > 1 && !attrs.multiple.unwrap_or(false) {
        return Err(format!("{} accepts a single file", field.label));
    }

    for file in files {
        if let Some(max) = attrs.max_size {
            if file.size > max {
                return Err(format!(
                    "File {} exceeds the maximum size limit of {}",
                    file.name,
                    format_bytes(max)
                ));
            }
        }
        if images_only && !file.mime_type.starts_with("image/") {
            return Err(format!("File {} is not an image", file.name));
        }
        if let Some(allowed) = &attrs.allowed_types {
            if !allowed.is_empty() && !allowed.iter().any(|t| t == &file.mime_type) {
                return Err(format!("File {} has a type that is not allowed", file.name));
            }
        }
    }
    Ok(())
}

/// Human-readable byte size with two decimals, e.g. `1.5 MB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut i = 0;
    let mut whole = bytes;
    while whole >= 1024 && i < UNITS.len() - 1 {
        whole /= 1024;
        i += 1;
    }
    let scaled = bytes as f64 / 1024f64.powi(i as i32);
    let rounded = (scaled * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldType;
    use serde_json::{json, Map};

    fn kind_for(field_type: FieldType) -> FieldKind {
        let mut attrs = Map::new();
        attrs.insert("type".into(), json!(field_type.as_str()));
        serde_json::from_value(Value::Object(attrs)).unwrap()
    }

    #[test]
    fn test_every_known_type_resolves() {
        for field_type in FieldType::ALL {
            let control = resolve(&kind_for(field_type));
            assert!(!matches!(control, Control::Placeholder { .. }), "{:?}", field_type);
        }
    }

    #[test]
    fn test_informational_kinds_take_no_input() {
        assert!(!resolve(&kind_for(FieldType::Section)).accepts_input());
        assert!(!resolve(&kind_for(FieldType::Heading)).accepts_input());
        assert!(resolve(&kind_for(FieldType::Signature)).accepts_input());
    }

    #[test]
    fn test_unknown_type_renders_placeholder() {
        let field: FieldDefinition = serde_json::from_value(json!({
            "type": "barcode", "label": "Scan", "name": "scan", "required": true, "order": 1
        }))
        .unwrap();

        let view = render(&field, Some(&json!("x")), None, false);
        assert_eq!(view.control, Control::Placeholder { type_name: "barcode".into() });
        assert!(view.notice.unwrap().contains("barcode"));
        assert!(view.value.is_none());
        assert!(!view.required);
    }

    #[test]
    fn test_render_falls_back_to_default_value() {
        let mut field = FieldDefinition::new("city", "City", FieldKind::Text(TextAttrs::default()), 1);
        field.default_value = Some(json!("Berlin"));

        let view = render(&field, None, Some("City is required"), false);
        assert_eq!(view.value, Some(json!("Berlin")));
        assert_eq!(view.error.as_deref(), Some("City is required"));
    }

    #[test]
    fn test_selected_values() {
        assert_eq!(selected_values(Some(&json!(["a", "b"]))), vec!["a", "b"]);
        assert_eq!(selected_values(Some(&json!("a"))), vec!["a"]);
        assert!(selected_values(Some(&json!(""))).is_empty());
        assert!(selected_values(None).is_empty());
    }

    #[test]
    fn test_check_upload_limits() {
        let field = FieldDefinition::new(
            "photo",
            "Photo",
            FieldKind::Image(FileAttrs { max_size: Some(1024 * 1024), ..Default::default() }),
            1,
        );
        let small = FileMeta { name: "a.png".into(), size: 10, mime_type: "image/png".into() };
        let big = FileMeta { name: "b.png".into(), size: 2 * 1024 * 1024, mime_type: "image/png".into() };
        let doc = FileMeta { name: "c.pdf".into(), size: 10, mime_type: "application/pdf".into() };

        assert!(check_upload(&field, &[small.clone()]).is_ok());
        assert_eq!(
            check_upload(&field, &[big]).unwrap_err(),
            "File b.png exceeds the maximum size limit of 1 MB"
        );
        assert!(check_upload(&field, &[doc]).is_err());
        assert!(check_upload(&field, &[small.clone(), small]).is_err());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(512), "512 Bytes");
        assert_eq!(format_bytes(1536), "1.5 KB");
    }
}
