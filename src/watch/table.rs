//! Console rendering of records, hiding fields that carry no information

use super::fields::Record;

/// One line per informative field: `\t<name> <value>`
pub fn render_record<R: Record>(record: &R) -> String {
    record
        .fields()
        .into_iter()
        .filter(|(_, value)| !value.is_placeholder())
        .map(|(name, value)| format!("\t{} {}", name, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a list of records, one indexed block per row
pub fn render_rows<R: Record>(rows: &[R]) -> String {
    if rows.is_empty() {
        return "\t(empty)".to_string();
    }
    rows.iter()
        .enumerate()
        .map(|(i, row)| format!("[{}]\n{}", i, render_record(row)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{AccountInfo, PositionRecord};

    #[test]
    fn test_placeholders_are_hidden() {
        let info = AccountInfo {
            cash: Some(1000.0),
            frozen_cash: Some(0.0),
            currency: Some("HKD".to_string()),
            ..Default::default()
        };
        assert_eq!(render_record(&info), "\tcash 1000\n\tcurrency HKD");
    }

    #[test]
    fn test_render_rows() {
        let rows = vec![PositionRecord {
            code: "HK.00700".to_string(),
            qty: 100.0,
            ..Default::default()
        }];
        let out = render_rows(&rows);
        assert!(out.starts_with("[0]\n\tcode HK.00700"));
        assert!(out.contains("\tqty 100"));
        assert_eq!(render_rows::<PositionRecord>(&[]), "\t(empty)");
    }
}
