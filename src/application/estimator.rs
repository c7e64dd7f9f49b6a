//! Export metadata estimation.
//!
//! Sizes are fixed multiples of the JSON-serialized conversation. They are
//! estimates for the preview, not a promise about the rendered payload.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{
    AppError, Conversation, ExportDuration, ExportFormat, ExportMetadata, Persona, Result,
};

/// Size multiplier per format as a `numerator / 10` ratio of the JSON size.
const fn size_ratio(format: ExportFormat) -> u64 {
    match format {
        ExportFormat::Json => 10,
        ExportFormat::Txt => 8,
        ExportFormat::Docx => 12,
        ExportFormat::Pdf => 15,
    }
}

/// Computes the export preview for a conversation.
///
/// # Errors
/// Returns error if the conversation cannot be serialized.
pub fn estimate_export(conversation: &Conversation) -> Result<ExportMetadata> {
    let json_len = serde_json::to_vec(conversation)
        .map_err(AppError::json_parse)?
        .len() as u64;

    let estimated_size_bytes: BTreeMap<ExportFormat, u64> = ExportFormat::ALL
        .into_iter()
        .map(|format| (format, (json_len * size_ratio(format)).div_ceil(10)))
        .collect();

    let personas_used: BTreeSet<Persona> = conversation
        .messages
        .iter()
        .filter_map(crate::domain::Message::persona)
        .collect();

    Ok(ExportMetadata {
        message_count: conversation.message_count(),
        has_analysis: conversation.messages.iter().any(|m| m.is_analysis()),
        has_code: conversation.messages.iter().any(|m| m.is_code()),
        personas_used,
        duration: ExportDuration {
            start: conversation.created_at,
            end: conversation.last_activity(),
        },
        estimated_size_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::render::fixtures::{at, consultation};
    use crate::domain::{Message, MessageMetadata, Role};

    #[test]
    fn test_empty_conversation() {
        let conv = Conversation::new("empty");
        let meta = estimate_export(&conv).unwrap();
        assert_eq!(meta.message_count, 0);
        assert!(!meta.has_analysis);
        assert!(!meta.has_code);
        assert!(meta.personas_used.is_empty());
        assert_eq!(meta.duration.start, meta.duration.end);
    }

    #[test]
    fn test_composition() {
        let mut conv = consultation();
        conv.messages.push(
            Message::new(Role::Assistant, "Gap analysis")
                .at(at(9))
                .with_metadata(MessageMetadata {
                    analysis_type: Some("erp".into()),
                    persona: Some(Persona::Analyst),
                    ..Default::default()
                }),
        );

        let meta = estimate_export(&conv).unwrap();
        assert_eq!(meta.message_count, conv.messages.len());
        assert!(meta.has_analysis);
        assert!(meta.has_code);
        assert_eq!(
            meta.personas_used.into_iter().collect::<Vec<_>>(),
            vec![Persona::Sap, Persona::Analyst]
        );
        assert_eq!(meta.duration.start, at(0));
        assert_eq!(meta.duration.end, at(9));
    }

    #[test]
    fn test_size_multipliers() {
        let conv = consultation();
        let n = serde_json::to_vec(&conv).unwrap().len() as u64;
        let sizes = estimate_export(&conv).unwrap().estimated_size_bytes;

        assert_eq!(sizes[&ExportFormat::Json], n);
        assert_eq!(sizes[&ExportFormat::Txt], (n * 8).div_ceil(10));
        assert_eq!(sizes[&ExportFormat::Docx], (n * 12).div_ceil(10));
        assert_eq!(sizes[&ExportFormat::Pdf], (n * 15).div_ceil(10));
        assert!(sizes[&ExportFormat::Txt] < sizes[&ExportFormat::Pdf]);
    }

    #[test]
    fn test_metadata_serializes_format_keys() {
        let meta = estimate_export(&consultation()).unwrap();
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json["estimatedSizeBytes"]["pdf"].is_u64());
        assert_eq!(json["personasUsed"][0], "sap");
        assert_eq!(json["messageCount"], 4);
    }
}
