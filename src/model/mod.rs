pub mod codec;
pub mod metadata;
pub mod record;

pub use codec::{decode, encode, CodecError};
pub use metadata::{MappingWarning, MetadataMapping, MetadataRecord};
pub use record::{
    Field, FieldSet, FieldValue, PixelData, PixelPayload, PixelShape, Record, RecordMeta,
};
