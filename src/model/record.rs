use dicom::core::dictionary::DataDictionary;
use dicom::core::{Tag, VR};
use dicom::dictionary_std::{tags, StandardDataDictionary};
use std::collections::BTreeMap;

use crate::utils::format_tag;

pub type FieldSet = BTreeMap<Tag, Field>;

/// File meta information needed to write the record back with the same encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMeta {
    pub transfer_syntax: String,
    pub media_storage_sop_class_uid: String,
    pub media_storage_sop_instance_uid: String,
}

/// A decoded DICOM data set: typed fields keyed by tag plus the pixel buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    meta: RecordMeta,
    fields: FieldSet,
    pixels: Option<PixelData>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub tag: Tag,
    pub vr: VR,
    pub name: String,
    pub opaque: bool,
    pub value: FieldValue,
}

/// Field values grouped by VR family.
///
/// Text components never carry DICOM padding, and a text value whose every
/// component is empty is represented as `Empty`. Components must not contain
/// the `\` multi-value delimiter.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Empty,
    Text(Vec<String>),
    Signed(Vec<i64>),
    Unsigned(Vec<u64>),
    Float(Vec<f64>),
    Tags(Vec<Tag>),
    Bytes(Vec<u8>),
    Sequence(Vec<FieldSet>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelShape {
    pub frames: u32,
    pub rows: u16,
    pub columns: u16,
    pub samples_per_pixel: u16,
    pub bits_allocated: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PixelPayload {
    Native(Vec<u8>),
    Encapsulated {
        offset_table: Vec<u32>,
        fragments: Vec<Vec<u8>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PixelData {
    pub vr: VR,
    pub shape: PixelShape,
    pub payload: PixelPayload,
}

impl Record {
    pub fn new(meta: RecordMeta) -> Self {
        Self {
            meta,
            fields: FieldSet::new(),
            pixels: None,
        }
    }

    pub fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn field_set(&self) -> &FieldSet {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Inserts a field, replacing any field that had the same tag.
    pub fn insert(&mut self, field: Field) -> Option<Field> {
        self.fields.insert(field.tag, field)
    }

    pub fn remove(&mut self, tag: Tag) -> Option<Field> {
        self.fields.remove(&tag)
    }

    pub fn get(&self, tag: Tag) -> Option<&Field> {
        self.fields.get(&tag)
    }

    pub fn get_mut(&mut self, tag: Tag) -> Option<&mut Field> {
        self.fields.get_mut(&tag)
    }

    pub fn by_name(&self, name: &str) -> Option<&Field> {
        self.fields.values().find(|field| field.name == name)
    }

    /// First text component of the named field, trimmed, if any.
    pub fn text(&self, name: &str) -> Option<&str> {
        match &self.by_name(name)?.value {
            FieldValue::Text(values) => values
                .first()
                .map(|value| value.trim())
                .filter(|value| !value.is_empty()),
            _ => None,
        }
    }

    pub fn pixels(&self) -> Option<&PixelData> {
        self.pixels.as_ref()
    }

    pub fn set_pixels(&mut self, pixels: Option<PixelData>) {
        self.pixels = pixels;
    }

    /// Pixel geometry as declared by the image pixel module attributes.
    pub fn declared_shape(&self) -> PixelShape {
        PixelShape {
            frames: self
                .number(tags::NUMBER_OF_FRAMES)
                .and_then(|frames| u32::try_from(frames).ok())
                .unwrap_or(1),
            rows: self.small_number(tags::ROWS).unwrap_or(0),
            columns: self.small_number(tags::COLUMNS).unwrap_or(0),
            samples_per_pixel: self.small_number(tags::SAMPLES_PER_PIXEL).unwrap_or(1),
            bits_allocated: self.small_number(tags::BITS_ALLOCATED).unwrap_or(8),
        }
    }

    /// Reads a single integer attribute whether it is stored binary (US/UL) or as
    /// an integer string (IS).
    pub fn number(&self, tag: Tag) -> Option<i64> {
        match &self.get(tag)?.value {
            FieldValue::Unsigned(values) => values.first().and_then(|v| i64::try_from(*v).ok()),
            FieldValue::Signed(values) => values.first().copied(),
            FieldValue::Text(values) => values.first().and_then(|v| v.trim().parse().ok()),
            _ => None,
        }
    }

    fn small_number(&self, tag: Tag) -> Option<u16> {
        self.number(tag).and_then(|value| u16::try_from(value).ok())
    }
}

impl Field {
    /// Builds a field, naming it after the standard dictionary alias of its tag.
    pub fn new(tag: Tag, vr: VR, value: FieldValue) -> Self {
        let (name, opaque) = match StandardDataDictionary.by_tag(tag) {
            Some(entry) => (entry.alias.to_string(), false),
            None => (format_tag(tag), true),
        };
        Self {
            tag,
            vr,
            name,
            opaque,
            value,
        }
    }

    pub fn text(tag: Tag, vr: VR, value: &str) -> Self {
        Self::new(tag, vr, FieldValue::text([value]))
    }

    pub fn unsigned(tag: Tag, vr: VR, value: u64) -> Self {
        Self::new(tag, vr, FieldValue::Unsigned(vec![value]))
    }
}

impl FieldValue {
    /// Builds a normalized text value.
    pub fn text<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let values: Vec<String> = values
            .into_iter()
            .map(|value| value.as_ref().trim_end_matches([' ', '\0']).to_string())
            .collect();
        if values.iter().all(|value| value.is_empty()) {
            FieldValue::Empty
        } else {
            FieldValue::Text(values)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(values) => values.iter().all(|value| value.is_empty()),
            FieldValue::Signed(values) => values.is_empty(),
            FieldValue::Unsigned(values) => values.is_empty(),
            FieldValue::Float(values) => values.is_empty(),
            FieldValue::Tags(values) => values.is_empty(),
            FieldValue::Bytes(values) => values.is_empty(),
            FieldValue::Sequence(_) => false,
        }
    }
}

pub fn is_text_vr(vr: VR) -> bool {
    matches!(
        vr,
        VR::AE
            | VR::AS
            | VR::CS
            | VR::DA
            | VR::DS
            | VR::DT
            | VR::IS
            | VR::LO
            | VR::LT
            | VR::PN
            | VR::SH
            | VR::ST
            | VR::TM
            | VR::UC
            | VR::UI
            | VR::UR
            | VR::UT
    )
}

pub fn is_binary_vr(vr: VR) -> bool {
    matches!(
        vr,
        VR::OB | VR::OD | VR::OF | VR::OL | VR::OV | VR::OW | VR::UN
    )
}
