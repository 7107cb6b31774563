//! Field Definitions
//!
//! One configured input in a template. The common attributes live on
//! `FieldDefinition`; the attributes that only make sense for one kind of
//! input live in the `FieldKind` variant, discriminated by the `type` key.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

use super::timestamp::{self, Timestamp};

/// The closed set of field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    Number,
    Email,
    Phone,
    Date,
    Time,
    Select,
    Multiselect,
    Checkbox,
    Radio,
    Textarea,
    Signature,
    File,
    Image,
    Location,
    Section,
    Heading,
}

impl FieldType {
    pub const ALL: [FieldType; 17] = [
        FieldType::Text,
        FieldType::Number,
        FieldType::Email,
        FieldType::Phone,
        FieldType::Date,
        FieldType::Time,
        FieldType::Select,
        FieldType::Multiselect,
        FieldType::Checkbox,
        FieldType::Radio,
        FieldType::Textarea,
        FieldType::Signature,
        FieldType::File,
        FieldType::Image,
        FieldType::Location,
        FieldType::Section,
        FieldType::Heading,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Select => "select",
            FieldType::Multiselect => "multiselect",
            FieldType::Checkbox => "checkbox",
            FieldType::Radio => "radio",
            FieldType::Textarea => "textarea",
            FieldType::Signature => "signature",
            FieldType::File => "file",
            FieldType::Image => "image",
            FieldType::Location => "location",
            FieldType::Section => "section",
            FieldType::Heading => "heading",
        }
    }

    /// Unknown names yield `None`; callers keep them as `FieldKind::Unknown`
    pub fn from_str(s: &str) -> Option<Self> {
        FieldType::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

/// Attributes of text, email and phone inputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAreaAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateAttrs {
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub min_date: Option<Timestamp>,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub max_date: Option<Timestamp>,
}

/// One selectable option of a choice field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceAttrs {
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_other: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttrs {
    /// Size limit in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple: Option<bool>,
    /// MIME types such as `image/png`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_types: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pen_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_high_accuracy: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
}

/// Field kind with its type-specific attributes
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text(TextAttrs),
    Email(TextAttrs),
    Phone(TextAttrs),
    Textarea(TextAreaAttrs),
    Number(NumberAttrs),
    Date(DateAttrs),
    Time(DateAttrs),
    Select(ChoiceAttrs),
    Multiselect(ChoiceAttrs),
    Checkbox(ChoiceAttrs),
    Radio(ChoiceAttrs),
    File(FileAttrs),
    Image(FileAttrs),
    Signature(SignatureAttrs),
    Location(LocationAttrs),
    Section(SectionAttrs),
    Heading(SectionAttrs),
    /// A type this build does not know; attributes are kept verbatim
    Unknown { type_name: String, attrs: Map<String, Value> },
}

impl FieldKind {
    /// `None` for unknown kinds
    pub fn field_type(&self) -> Option<FieldType> {
        Some(match self {
            FieldKind::Text(_) => FieldType::Text,
            FieldKind::Email(_) => FieldType::Email,
            FieldKind::Phone(_) => FieldType::Phone,
            FieldKind::Textarea(_) => FieldType::Textarea,
            FieldKind::Number(_) => FieldType::Number,
            FieldKind::Date(_) => FieldType::Date,
            FieldKind::Time(_) => FieldType::Time,
            FieldKind::Select(_) => FieldType::Select,
            FieldKind::Multiselect(_) => FieldType::Multiselect,
            FieldKind::Checkbox(_) => FieldType::Checkbox,
            FieldKind::Radio(_) => FieldType::Radio,
            FieldKind::File(_) => FieldType::File,
            FieldKind::Image(_) => FieldType::Image,
            FieldKind::Signature(_) => FieldType::Signature,
            FieldKind::Location(_) => FieldType::Location,
            FieldKind::Section(_) => FieldType::Section,
            FieldKind::Heading(_) => FieldType::Heading,
            FieldKind::Unknown { .. } => return None,
        })
    }

    pub fn type_name(&self) -> &str {
        match self {
            FieldKind::Unknown { type_name, .. } => type_name,
            other => other.field_type().map(|t| t.as_str()).unwrap_or_default(),
        }
    }

    /// Section and heading only display content; they hold no answer
    pub fn is_informational(&self) -> bool {
        matches!(self, FieldKind::Section(_) | FieldKind::Heading(_))
    }

    fn attrs_to_map(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let value = match self {
            FieldKind::Text(a) | FieldKind::Email(a) | FieldKind::Phone(a) => serde_json::to_value(a)?,
            FieldKind::Textarea(a) => serde_json::to_value(a)?,
            FieldKind::Number(a) => serde_json::to_value(a)?,
            FieldKind::Date(a) | FieldKind::Time(a) => serde_json::to_value(a)?,
            FieldKind::Select(a) | FieldKind::Multiselect(a) | FieldKind::Checkbox(a) | FieldKind::Radio(a) => {
                serde_json::to_value(a)?
            }
            FieldKind::File(a) | FieldKind::Image(a) => serde_json::to_value(a)?,
            FieldKind::Signature(a) => serde_json::to_value(a)?,
            FieldKind::Location(a) => serde_json::to_value(a)?,
            FieldKind::Section(a) | FieldKind::Heading(a) => serde_json::to_value(a)?,
            FieldKind::Unknown { attrs, .. } => return Ok(attrs.clone()),
        };
        match value {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    fn from_parts(type_name: String, attrs: Map<String, Value>) -> Result<Self, serde_json::Error> {
        let Some(field_type) = FieldType::from_str(&type_name) else {
            return Ok(FieldKind::Unknown { type_name, attrs });
        };
        let value = Value::Object(attrs);
        Ok(match field_type {
            FieldType::Text => FieldKind::Text(serde_json::from_value(value)?),
            FieldType::Email => FieldKind::Email(serde_json::from_value(value)?),
            FieldType::Phone => FieldKind::Phone(serde_json::from_value(value)?),
            FieldType::Textarea => FieldKind::Textarea(serde_json::from_value(value)?),
            FieldType::Number => FieldKind::Number(serde_json::from_value(value)?),
            FieldType::Date => FieldKind::Date(serde_json::from_value(value)?),
            FieldType::Time => FieldKind::Time(serde_json::from_value(value)?),
            FieldType::Select => FieldKind::Select(serde_json::from_value(value)?),
            FieldType::Multiselect => FieldKind::Multiselect(serde_json::from_value(value)?),
            FieldType::Checkbox => FieldKind::Checkbox(serde_json::from_value(value)?),
            FieldType::Radio => FieldKind::Radio(serde_json::from_value(value)?),
            FieldType::File => FieldKind::File(serde_json::from_value(value)?),
            FieldType::Image => FieldKind::Image(serde_json::from_value(value)?),
            FieldType::Signature => FieldKind::Signature(serde_json::from_value(value)?),
            FieldType::Location => FieldKind::Location(serde_json::from_value(value)?),
            FieldType::Section => FieldKind::Section(serde_json::from_value(value)?),
            FieldType::Heading => FieldKind::Heading(serde_json::from_value(value)?),
        })
    }
}

impl Default for FieldKind {
    fn default() -> Self {
        FieldKind::Text(TextAttrs::default())
    }
}

impl Serialize for FieldKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let attrs = self.attrs_to_map().map_err(serde::ser::Error::custom)?;
        let mut map = serializer.serialize_map(Some(attrs.len() + 1))?;
        map.serialize_entry("type", self.type_name())?;
        for (k, v) in &attrs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut attrs = Map::<String, Value>::deserialize(deserializer)?;
        let type_name = match attrs.remove("type") {
            Some(Value::String(s)) => s,
            Some(other) => return Err(serde::de::Error::custom(format!("invalid field type: {}", other))),
            None => return Err(serde::de::Error::missing_field("type")),
        };
        FieldKind::from_parts(type_name, attrs).map_err(serde::de::Error::custom)
    }
}

/// Rule kinds understood by the validation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationKind {
    Required,
    MinLength,
    MaxLength,
    Pattern,
    Min,
    Max,
    Email,
    Url,
    Custom,
}

/// A single validation rule; the first failing rule of a field wins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(rename = "type")]
    pub kind: ValidationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub message: String,
}

impl ValidationRule {
    pub fn new(kind: ValidationKind, value: Option<Value>, message: impl Into<String>) -> Self {
        Self {
            kind,
            value,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
}

/// Display a field only when another field's answer satisfies the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalRule {
    pub depends_on: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
}

/// One configured input in a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    /// Unique within a template; the key answers are stored under
    pub name: String,
    #[serde(default)]
    pub required: bool,
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validations: Option<Vec<ValidationRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_display: Option<ConditionalRule>,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind, order: i64) -> Self {
        Self {
            id: None,
            label: label.into(),
            name: name.into(),
            required: false,
            order,
            help_text: None,
            default_value: None,
            is_hidden: None,
            validations: None,
            conditional_display: None,
            kind,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.is_hidden = Some(true);
        self
    }

    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.validations.get_or_insert_with(Vec::new).push(rule);
        self
    }

    pub fn shown_when(mut self, rule: ConditionalRule) -> Self {
        self.conditional_display = Some(rule);
        self
    }

    pub fn is_hidden(&self) -> bool {
        self.is_hidden.unwrap_or(false)
    }

    pub fn rules(&self) -> &[ValidationRule] {
        self.validations.as_deref().unwrap_or(&[])
    }
}
