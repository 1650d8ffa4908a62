pub mod formatting;

pub use formatting::{format_tag, value_to_column, value_to_string};
