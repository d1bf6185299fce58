pub mod panels;
pub mod plot;

use crate::data::model::CategoryValue;

/// Label for a category value in filters, axes and tables.
pub fn value_label(value: &CategoryValue) -> String {
    match value {
        CategoryValue::Flag(true) => "Yes (1)".to_string(),
        CategoryValue::Flag(false) => "No (0)".to_string(),
        CategoryValue::Text(s) if s.is_empty() => "<blank>".to_string(),
        CategoryValue::Text(s) => s.clone(),
    }
}
