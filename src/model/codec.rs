//! Reading and writing DICOM files as [`Record`]s.
//!
//! Writes are staged in a temporary file next to the destination and renamed into
//! place, so a destination path only ever holds a complete artifact.

use dicom::core::header::Header;
use dicom::core::value::{DataSetSequence, PixelFragmentSequence, PrimitiveValue, Value, C};
use dicom::core::{DataElement, Length, VR};
use dicom::dictionary_std::tags;
use dicom::object::mem::InMemElement;
use dicom::object::{open_file, DefaultDicomObject, FileMetaTableBuilder, InMemDicomObject};
use std::fmt::Display;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use super::record::{
    is_text_vr, Field, FieldSet, FieldValue, PixelData, PixelPayload, PixelShape, Record,
    RecordMeta,
};
use crate::error::ErrorKind;
use crate::utils::format_tag;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{}: I/O failure ({source})", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: malformed record ({message})", .path.display())]
    Format { path: PathBuf, message: String },
    #[error("{}: failed to write record ({message})", .path.display())]
    Write { path: PathBuf, message: String },
}

impl CodecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::Format { .. } => ErrorKind::Format,
            CodecError::Io { .. } | CodecError::Write { .. } => ErrorKind::Io,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            CodecError::Io { path, .. }
            | CodecError::Format { path, .. }
            | CodecError::Write { path, .. } => path,
        }
    }
}

pub fn decode(path: &Path) -> Result<Record, CodecError> {
    log::debug!("Decoding DICOM file: {}", path.display());

    // Separate "cannot read" from "not DICOM" before handing the path to the parser.
    File::open(path).map_err(|source| CodecError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let object = open_file(path).map_err(|err| CodecError::Format {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    record_from_object(&object).map_err(|message| CodecError::Format {
        path: path.to_path_buf(),
        message,
    })
}

pub fn encode(record: &Record, destination: &Path) -> Result<(), CodecError> {
    log::debug!("Encoding DICOM file: {}", destination.display());
    let object = object_from_record(record).map_err(|message| CodecError::Format {
        path: destination.to_path_buf(),
        message,
    })?;

    let directory = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let io_error = |source| CodecError::Io {
        path: destination.to_path_buf(),
        source,
    };

    let staged = NamedTempFile::new_in(directory).map_err(io_error)?;
    object
        .write_to_file(staged.path())
        .map_err(|err| CodecError::Write {
            path: destination.to_path_buf(),
            message: err.to_string(),
        })?;
    staged.as_file().sync_all().map_err(io_error)?;
    staged
        .persist(destination)
        .map_err(|err| io_error(err.error))?;
    Ok(())
}

fn record_from_object(object: &DefaultDicomObject) -> Result<Record, String> {
    let meta = object.meta();
    let mut record = Record::new(RecordMeta {
        transfer_syntax: meta.transfer_syntax().to_string(),
        media_storage_sop_class_uid: meta.media_storage_sop_class_uid().to_string(),
        media_storage_sop_instance_uid: meta.media_storage_sop_instance_uid().to_string(),
    });

    let mut pixel_element = None;
    for element in object.iter() {
        if element.tag() == tags::PIXEL_DATA {
            pixel_element = Some(element);
            continue;
        }
        record.insert(field_from_element(element)?);
    }

    if let Some(element) = pixel_element {
        let shape = record.declared_shape();
        record.set_pixels(Some(pixels_from_element(element, shape)?));
    }

    Ok(record)
}

fn field_from_element(element: &InMemElement) -> Result<Field, String> {
    let tag = element.tag();
    let vr = element.vr();
    let value = match element.value() {
        Value::Primitive(primitive) => value_from_primitive(primitive, vr)
            .map_err(|err| format!("{}: {err}", format_tag(tag)))?,
        Value::Sequence(sequence) => FieldValue::Sequence(
            sequence
                .items()
                .iter()
                .map(field_set_from_object)
                .collect::<Result<_, _>>()?,
        ),
        Value::PixelSequence(_) => {
            return Err(format!(
                "{}: encapsulated value outside of pixel data",
                format_tag(tag)
            ))
        }
    };
    Ok(Field::new(tag, vr, value))
}

fn field_set_from_object(item: &InMemDicomObject) -> Result<FieldSet, String> {
    item.iter()
        .map(|element| field_from_element(element).map(|field| (field.tag, field)))
        .collect()
}

fn value_from_primitive(primitive: &PrimitiveValue, vr: VR) -> Result<FieldValue, String> {
    if matches!(primitive, PrimitiveValue::Empty) {
        return Ok(FieldValue::Empty);
    }

    let value = match vr {
        vr if is_text_vr(vr) => FieldValue::text(primitive.to_multi_str().iter()),
        VR::SS | VR::SL | VR::SV => {
            FieldValue::Signed(primitive.to_multi_int::<i64>().map_err(|e| e.to_string())?)
        }
        VR::US | VR::UL | VR::UV => {
            FieldValue::Unsigned(primitive.to_multi_int::<u64>().map_err(|e| e.to_string())?)
        }
        VR::FL | VR::FD => {
            FieldValue::Float(primitive.to_multi_float64().map_err(|e| e.to_string())?)
        }
        VR::AT => match primitive {
            PrimitiveValue::Tags(values) => FieldValue::Tags(values.to_vec()),
            other => return Err(format!("attribute tag value stored as {other:?}")),
        },
        _ => FieldValue::Bytes(primitive.to_bytes().into_owned()),
    };

    Ok(if value.is_empty() {
        FieldValue::Empty
    } else {
        value
    })
}

fn pixels_from_element(element: &InMemElement, shape: PixelShape) -> Result<PixelData, String> {
    let payload = match element.value() {
        Value::Primitive(primitive) => PixelPayload::Native(primitive.to_bytes().into_owned()),
        Value::PixelSequence(sequence) => PixelPayload::Encapsulated {
            offset_table: sequence.offset_table().to_vec(),
            fragments: sequence.fragments().to_vec(),
        },
        Value::Sequence(_) => return Err(String::from("pixel data holds a data set sequence")),
    };
    Ok(PixelData {
        vr: element.vr(),
        shape,
        payload,
    })
}

pub(crate) fn object_from_record(record: &Record) -> Result<DefaultDicomObject, String> {
    let mut object = object_from_fields(record.field_set())?;
    if let Some(pixels) = record.pixels() {
        object.put(pixel_element(pixels));
    }

    let meta = record.meta();
    let builder = FileMetaTableBuilder::new()
        .transfer_syntax(meta.transfer_syntax.as_str())
        .media_storage_sop_class_uid(meta.media_storage_sop_class_uid.as_str())
        .media_storage_sop_instance_uid(meta.media_storage_sop_instance_uid.as_str());
    object.with_meta(builder).map_err(|err| err.to_string())
}

fn object_from_fields(fields: &FieldSet) -> Result<InMemDicomObject, String> {
    let mut object = InMemDicomObject::new_empty();
    for field in fields.values() {
        object.put(element_from_field(field)?);
    }
    Ok(object)
}

fn element_from_field(field: &Field) -> Result<InMemElement, String> {
    let value = match &field.value {
        FieldValue::Sequence(items) => {
            let items = items
                .iter()
                .map(object_from_fields)
                .collect::<Result<Vec<_>, _>>()?;
            Value::Sequence(DataSetSequence::new(items, Length::UNDEFINED))
        }
        other => Value::Primitive(
            primitive_from_value(other, field.vr)
                .map_err(|message| format!("{}: {message}", format_tag(field.tag)))?,
        ),
    };
    Ok(DataElement::new(field.tag, field.vr, value))
}

fn primitive_from_value(value: &FieldValue, vr: VR) -> Result<PrimitiveValue, String> {
    Ok(match value {
        FieldValue::Empty => PrimitiveValue::Empty,
        FieldValue::Text(values) => PrimitiveValue::Strs(values.iter().cloned().collect()),
        FieldValue::Signed(values) => match vr {
            VR::SS => PrimitiveValue::I16(narrow(values)?),
            VR::SL => PrimitiveValue::I32(narrow(values)?),
            _ => PrimitiveValue::I64(values.iter().copied().collect()),
        },
        FieldValue::Unsigned(values) => match vr {
            VR::US => PrimitiveValue::U16(narrow(values)?),
            VR::UL => PrimitiveValue::U32(narrow(values)?),
            _ => PrimitiveValue::U64(values.iter().copied().collect()),
        },
        FieldValue::Float(values) => match vr {
            VR::FL => PrimitiveValue::F32(values.iter().map(|value| *value as f32).collect()),
            _ => PrimitiveValue::F64(values.iter().copied().collect()),
        },
        FieldValue::Tags(values) => PrimitiveValue::Tags(values.iter().copied().collect()),
        FieldValue::Bytes(bytes) => PrimitiveValue::U8(bytes.iter().copied().collect()),
        FieldValue::Sequence(_) => {
            return Err(String::from("sequence cannot be stored as a primitive value"))
        }
    })
}

fn narrow<S, T>(values: &[S]) -> Result<C<T>, String>
where
    S: Copy + Display,
    T: TryFrom<S>,
{
    values
        .iter()
        .map(|value| T::try_from(*value).map_err(|_| format!("value {value} out of range for VR")))
        .collect()
}

fn pixel_element(pixels: &PixelData) -> InMemElement {
    let value = match &pixels.payload {
        PixelPayload::Native(bytes) => {
            Value::Primitive(PrimitiveValue::U8(bytes.iter().copied().collect()))
        }
        PixelPayload::Encapsulated {
            offset_table,
            fragments,
        } => Value::PixelSequence(PixelFragmentSequence::new(
            offset_table.clone(),
            fragments.clone(),
        )),
    };
    DataElement::new(tags::PIXEL_DATA, pixels.vr, value)
}
