use dicom::core::VR;
use dicom::dictionary_std::tags;

use crate::model::{Field, FieldValue, PixelData, PixelPayload, Record, RecordMeta};

pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
pub const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";

/// Three 2x2 8-bit slices of a CT volume for patient "Jane Doe".
pub fn sample_record() -> Record {
    let mut record = Record::new(RecordMeta {
        transfer_syntax: EXPLICIT_VR_LITTLE_ENDIAN.to_string(),
        media_storage_sop_class_uid: CT_IMAGE_STORAGE.to_string(),
        media_storage_sop_instance_uid: "1.2.826.0.1.3680043.2.1125.1.1".to_string(),
    });

    record.insert(Field::text(tags::SOP_CLASS_UID, VR::UI, CT_IMAGE_STORAGE));
    record.insert(Field::text(
        tags::SOP_INSTANCE_UID,
        VR::UI,
        "1.2.826.0.1.3680043.2.1125.1.1",
    ));
    record.insert(Field::text(tags::STUDY_DATE, VR::DA, "20240312"));
    record.insert(Field::text(tags::MODALITY, VR::CS, "CT"));
    record.insert(Field::text(tags::PATIENT_NAME, VR::PN, "Jane Doe"));
    record.insert(Field::text(tags::PATIENT_ID, VR::LO, "12345"));
    record.insert(Field::text(tags::PATIENT_BIRTH_DATE, VR::DA, "19800101"));
    record.insert(Field::text(
        tags::STUDY_INSTANCE_UID,
        VR::UI,
        "1.2.826.0.1.3680043.2.1125.2",
    ));
    record.insert(Field::text(
        tags::SERIES_INSTANCE_UID,
        VR::UI,
        "1.2.826.0.1.3680043.2.1125.3",
    ));
    record.insert(Field::unsigned(tags::SAMPLES_PER_PIXEL, VR::US, 1));
    record.insert(Field::text(
        tags::PHOTOMETRIC_INTERPRETATION,
        VR::CS,
        "MONOCHROME2",
    ));
    record.insert(Field::text(tags::NUMBER_OF_FRAMES, VR::IS, "3"));
    record.insert(Field::unsigned(tags::ROWS, VR::US, 2));
    record.insert(Field::unsigned(tags::COLUMNS, VR::US, 2));
    record.insert(Field::unsigned(tags::BITS_ALLOCATED, VR::US, 8));
    record.insert(Field::unsigned(tags::BITS_STORED, VR::US, 8));
    record.insert(Field::unsigned(tags::HIGH_BIT, VR::US, 7));
    record.insert(Field::unsigned(tags::PIXEL_REPRESENTATION, VR::US, 0));
    record.insert(Field::new(
        tags::PATIENT_ADDRESS,
        VR::LO,
        FieldValue::Empty,
    ));

    let shape = record.declared_shape();
    record.set_pixels(Some(PixelData {
        vr: VR::OB,
        shape,
        payload: PixelPayload::Native(vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100, 110]),
    }));
    record
}
