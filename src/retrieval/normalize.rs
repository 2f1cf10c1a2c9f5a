use crate::corpus::types::RuleRecord;

use super::types::{NormalizedRule, RuleMetadata};

/// Jurisdiction recorded when neither the rule nor the corpus declares one.
pub const DEFAULT_JURISDICTION: &str = "general";

/// Flatten a rule record into embeddable text plus metadata.
///
/// Deterministic: the same record and default always produce a
/// byte-identical rule. Sections appear in a fixed order, one line each,
/// and only when the source field is non-empty after trimming.
pub fn normalize(record: &RuleRecord, default_jurisdiction: &str) -> NormalizedRule {
    let mut lines: Vec<String> = Vec::with_capacity(4);
    push_line(&mut lines, "Rule", Some(&record.rule));
    push_line(&mut lines, "Bad example", record.bad_example.as_deref());
    push_line(&mut lines, "Good example", record.good_example.as_deref());
    push_line(&mut lines, "Explanation", record.explanation.as_deref());

    let jurisdiction = match record.jurisdiction.as_deref().map(str::trim) {
        Some(j) if !j.is_empty() => j.to_string(),
        _ => default_jurisdiction.to_string(),
    };

    NormalizedRule {
        id: record.rule_id.clone(),
        text: lines.join("\n"),
        metadata: RuleMetadata {
            jurisdiction,
            severity: record.severity,
            contract_types: record.contract_types.clone(),
            category: none_if_blank(record.category.as_deref()),
            reference: none_if_blank(record.reference.as_deref()),
        },
    }
}

fn push_line(lines: &mut Vec<String>, label: &str, value: Option<&str>) {
    if let Some(value) = value {
        let value = value.trim();
        if !value.is_empty() {
            lines.push(format!("{}: {}", label, value));
        }
    }
}

fn none_if_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::types::Severity;

    fn full_record() -> RuleRecord {
        RuleRecord {
            rule_id: "PAY-1".to_string(),
            category: Some("payment".to_string()),
            rule: "State payment deadlines in calendar days.".to_string(),
            bad_example: Some("Payment due promptly.".to_string()),
            good_example: Some("Payment due within 30 calendar days.".to_string()),
            explanation: Some("Vague deadlines are unenforceable.".to_string()),
            severity: Severity::High,
            contract_types: vec!["msa".to_string(), "services".to_string()],
            jurisdiction: Some("US-NY".to_string()),
            reference: Some("UCC 2-310".to_string()),
        }
    }

    #[test]
    fn text_sections_appear_in_fixed_order() {
        let normalized = normalize(&full_record(), "general");
        assert_eq!(
            normalized.text,
            "Rule: State payment deadlines in calendar days.\n\
             Bad example: Payment due promptly.\n\
             Good example: Payment due within 30 calendar days.\n\
             Explanation: Vague deadlines are unenforceable."
        );
        assert_eq!(normalized.id, "PAY-1");
    }

    #[test]
    fn missing_or_blank_sections_are_skipped_entirely() {
        let mut record = full_record();
        record.bad_example = None;
        record.explanation = Some("   ".to_string());

        let normalized = normalize(&record, "general");
        assert_eq!(
            normalized.text,
            "Rule: State payment deadlines in calendar days.\n\
             Good example: Payment due within 30 calendar days."
        );
        assert!(!normalized.text.ends_with('\n'));
    }

    #[test]
    fn normalization_is_deterministic() {
        let record = full_record();
        let a = normalize(&record, "general");
        let b = normalize(&record, "general");
        assert_eq!(a, b);
    }

    #[test]
    fn jurisdiction_falls_back_to_the_corpus_default() {
        let mut record = full_record();
        record.jurisdiction = None;
        assert_eq!(normalize(&record, "US").metadata.jurisdiction, "US");

        record.jurisdiction = Some("  ".to_string());
        assert_eq!(normalize(&record, "US").metadata.jurisdiction, "US");

        record.jurisdiction = Some("US-CA".to_string());
        assert_eq!(normalize(&record, "US").metadata.jurisdiction, "US-CA");
    }

    #[test]
    fn metadata_carries_severity_types_category_reference() {
        let normalized = normalize(&full_record(), "general");
        let meta = &normalized.metadata;
        assert_eq!(meta.severity, Severity::High);
        assert_eq!(meta.contract_types, vec!["msa", "services"]);
        assert_eq!(meta.category.as_deref(), Some("payment"));
        assert_eq!(meta.reference.as_deref(), Some("UCC 2-310"));
    }
}
