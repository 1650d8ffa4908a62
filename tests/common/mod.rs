use dicom::core::VR;
use dicom::dictionary_std::tags;
use dicomancer_relay::model::{self, Field, PixelData, PixelPayload, Record, RecordMeta};
use std::path::{Path, PathBuf};

pub const PIXELS: [u8; 8] = [5, 15, 25, 35, 45, 55, 65, 75];

/// Two 2x2 8-bit MR slices for patient "Jane Doe", ID "12345".
pub fn jane_doe() -> Record {
    let mut record = Record::new(RecordMeta {
        transfer_syntax: "1.2.840.10008.1.2.1".to_string(),
        media_storage_sop_class_uid: "1.2.840.10008.5.1.4.1.1.4".to_string(),
        media_storage_sop_instance_uid: "2.25.1001".to_string(),
    });
    record.insert(Field::text(tags::SOP_INSTANCE_UID, VR::UI, "2.25.1001"));
    record.insert(Field::text(tags::STUDY_DATE, VR::DA, "20230704"));
    record.insert(Field::text(tags::MODALITY, VR::CS, "MR"));
    record.insert(Field::text(tags::PATIENT_NAME, VR::PN, "Jane Doe"));
    record.insert(Field::text(tags::PATIENT_ID, VR::LO, "12345"));
    record.insert(Field::text(tags::PATIENT_BIRTH_DATE, VR::DA, "19750521"));
    record.insert(Field::text(tags::STUDY_INSTANCE_UID, VR::UI, "2.25.2002"));
    record.insert(Field::text(tags::SERIES_INSTANCE_UID, VR::UI, "2.25.3003"));
    record.insert(Field::text(
        tags::PHOTOMETRIC_INTERPRETATION,
        VR::CS,
        "MONOCHROME2",
    ));
    record.insert(Field::text(tags::NUMBER_OF_FRAMES, VR::IS, "2"));
    record.insert(Field::unsigned(tags::SAMPLES_PER_PIXEL, VR::US, 1));
    record.insert(Field::unsigned(tags::ROWS, VR::US, 2));
    record.insert(Field::unsigned(tags::COLUMNS, VR::US, 2));
    record.insert(Field::unsigned(tags::BITS_ALLOCATED, VR::US, 8));
    record.insert(Field::unsigned(tags::BITS_STORED, VR::US, 8));
    record.insert(Field::unsigned(tags::HIGH_BIT, VR::US, 7));
    record.insert(Field::unsigned(tags::PIXEL_REPRESENTATION, VR::US, 0));

    let shape = record.declared_shape();
    record.set_pixels(Some(PixelData {
        vr: VR::OB,
        shape,
        payload: PixelPayload::Native(PIXELS.to_vec()),
    }));
    record
}

/// Writes a source file named `name` into `dir`.
pub fn write_source(dir: &Path, name: &str, record: &Record) -> PathBuf {
    let path = dir.join(name);
    model::encode(record, &path).expect("write source record");
    path
}
