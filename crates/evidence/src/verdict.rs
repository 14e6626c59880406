use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub verified: bool,
    pub explanation: String,
}

/// Interpret the verifier's free-text answer.
///
/// The verifier leads with "Corresponding" or "Not Corresponding" and follows
/// with a sentence or more of reasoning. The explanation is everything after
/// the first period, or the whole text when there is nothing after it.
pub fn parse_verdict(text: &str) -> Verdict {
    let lower = text.to_lowercase();
    let verified = lower.contains("corresponding") && !lower.contains("not corresponding");

    let explanation = match text.split_once('.') {
        Some((_, rest)) if !rest.trim().is_empty() => rest.trim().to_string(),
        _ => text.to_string(),
    };

    Verdict {
        verified,
        explanation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corresponding_is_verified() {
        let verdict = parse_verdict("Corresponding. The logo matches the brief.");
        assert!(verdict.verified);
        assert_eq!(verdict.explanation, "The logo matches the brief.");
    }

    #[test]
    fn not_corresponding_wins_regardless_of_case() {
        let verdict = parse_verdict("NOT CORRESPONDING. The image shows a cat.");
        assert!(!verdict.verified);
        assert_eq!(verdict.explanation, "The image shows a cat.");
    }

    #[test]
    fn explanation_keeps_later_periods() {
        let verdict = parse_verdict("Corresponding. Colors v2.1 used. Fonts ok.");
        assert_eq!(verdict.explanation, "Colors v2.1 used. Fonts ok.");
    }

    #[test]
    fn single_sentence_is_its_own_explanation() {
        assert_eq!(parse_verdict("Corresponding").explanation, "Corresponding");
        assert_eq!(parse_verdict("Corresponding.").explanation, "Corresponding.");
    }

    #[test]
    fn unrelated_text_is_not_verified() {
        assert!(!parse_verdict("Unable to read the image.").verified);
        assert!(!parse_verdict("").verified);
    }
}
