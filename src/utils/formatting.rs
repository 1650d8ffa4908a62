use dicom::core::Tag;

use crate::model::FieldValue;

const MAX_VALUE_LEN: usize = 120;

/// Renders a field value for logs and metadata columns, truncated to a sane width.
pub fn value_to_string(value: &FieldValue) -> String {
    let rendered = match value {
        FieldValue::Empty => String::from("(empty)"),
        FieldValue::Text(values) => values.join("\\"),
        FieldValue::Signed(values) => join_numbers(values),
        FieldValue::Unsigned(values) => join_numbers(values),
        FieldValue::Float(values) => join_numbers(values),
        FieldValue::Tags(values) => values
            .iter()
            .map(|tag| format_tag(*tag))
            .collect::<Vec<_>>()
            .join("\\"),
        FieldValue::Bytes(bytes) => format!("Binary data ({} bytes)", bytes.len()),
        FieldValue::Sequence(items) => {
            let count = items.len();
            let suffix = if count == 1 { "" } else { "s" };
            format!("Sequence ({count} item{suffix})")
        }
    };

    if rendered.chars().count() > MAX_VALUE_LEN {
        let mut truncated = rendered.chars().take(MAX_VALUE_LEN).collect::<String>();
        truncated.push('…');
        truncated
    } else {
        rendered
    }
}

/// Plain text of a value suitable for a storage column; `None` when there is nothing
/// meaningful to store.
pub fn value_to_column(value: &FieldValue) -> Option<String> {
    let text = match value {
        FieldValue::Empty | FieldValue::Bytes(_) | FieldValue::Sequence(_) => return None,
        FieldValue::Text(values) => values
            .iter()
            .map(|value| value.trim())
            .collect::<Vec<_>>()
            .join("\\"),
        other => value_to_string(other),
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

pub fn format_tag(tag: Tag) -> String {
    format!("{:04X},{:04X}", tag.group(), tag.element())
}

fn join_numbers<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_render_as_group_and_element() {
        assert_eq!(format_tag(Tag(0x0010, 0x0010)), "0010,0010");
        assert_eq!(format_tag(Tag(0x7FE0, 0x0010)), "7FE0,0010");
    }

    #[test]
    fn long_values_are_truncated() {
        let value = FieldValue::Text(vec!["x".repeat(200)]);
        let rendered = value_to_string(&value);
        assert_eq!(rendered.chars().count(), MAX_VALUE_LEN + 1);
        assert!(rendered.ends_with('…'));
    }

    #[test]
    fn columns_skip_binary_and_empty_values() {
        assert_eq!(value_to_column(&FieldValue::Empty), None);
        assert_eq!(value_to_column(&FieldValue::Bytes(vec![0; 4])), None);
        assert_eq!(
            value_to_column(&FieldValue::Text(vec!["A".into(), "B ".into()])),
            Some("A\\B".to_string())
        );
        assert_eq!(
            value_to_column(&FieldValue::Unsigned(vec![512])),
            Some("512".to_string())
        );
    }
}
