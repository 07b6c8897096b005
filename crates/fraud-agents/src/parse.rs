//! Extraction rules for scored responses. The scoring service is asked to
//! answer in a `RISK_SCORE / REASONING / RECOMMENDATION` template; free-form
//! answers fall back to keyword classes and finally to a neutral 0.5.

const RISK_MARKER: &str = "RISK_SCORE:";
const REASONING_MARKER: &str = "REASONING:";
const RECOMMENDATION_MARKER: &str = "RECOMMENDATION:";

const HIGH_RISK_KEYWORDS: [&str; 3] = ["high risk", "fraudulent", "suspicious"];
const MEDIUM_RISK_KEYWORDS: [&str; 3] = ["medium risk", "unusual", "concerning"];
const LOW_RISK_KEYWORDS: [&str; 3] = ["low risk", "normal", "legitimate"];

pub fn extract_risk_score(analysis: &str) -> f64 {
    if let Some(idx) = analysis.find(RISK_MARKER) {
        let rest = &analysis[idx + RISK_MARKER.len()..];
        let token = rest.lines().next().unwrap_or("").trim();
        if let Ok(score) = token.parse::<f64>() {
            return score.clamp(0.0, 1.0);
        }
    }

    let lower = analysis.to_lowercase();
    if HIGH_RISK_KEYWORDS.iter().any(|k| lower.contains(k)) {
        0.8
    } else if MEDIUM_RISK_KEYWORDS.iter().any(|k| lower.contains(k)) {
        0.6
    } else if LOW_RISK_KEYWORDS.iter().any(|k| lower.contains(k)) {
        0.2
    } else {
        0.5
    }
}

pub fn extract_reasoning(analysis: &str) -> String {
    if let Some(idx) = analysis.find(REASONING_MARKER) {
        let rest = &analysis[idx + REASONING_MARKER.len()..];
        let end = rest.find(RECOMMENDATION_MARKER).unwrap_or(rest.len());
        return rest[..end].trim().to_string();
    }

    if analysis.chars().count() > 200 {
        let prefix: String = analysis.chars().take(200).collect();
        format!("{prefix}...")
    } else {
        analysis.to_string()
    }
}

pub fn extract_recommendation(analysis: &str) -> String {
    match analysis.find(RECOMMENDATION_MARKER) {
        Some(idx) => analysis[idx + RECOMMENDATION_MARKER.len()..].trim().to_string(),
        None => "Standard fraud review recommended".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_score_line_wins_over_keywords() {
        let analysis = "RISK_SCORE: 0.85\nREASONING: looks legitimate\nRECOMMENDATION: decline";
        assert_eq!(extract_risk_score(analysis), 0.85);
    }

    #[test]
    fn risk_score_is_clamped_to_unit_interval() {
        assert_eq!(extract_risk_score("RISK_SCORE: 1.7"), 1.0);
        assert_eq!(extract_risk_score("RISK_SCORE: -0.3"), 0.0);
    }

    #[test]
    fn unparseable_risk_token_falls_back_to_keywords() {
        let analysis = "RISK_SCORE: [0.9]\nThis pattern is clearly fraudulent.";
        assert_eq!(extract_risk_score(analysis), 0.8);
    }

    #[test]
    fn keyword_classes_map_to_fixed_scores() {
        assert_eq!(extract_risk_score("Highly SUSPICIOUS velocity"), 0.8);
        assert_eq!(extract_risk_score("The amount is unusual for this card"), 0.6);
        assert_eq!(extract_risk_score("Normal grocery purchase"), 0.2);
        assert_eq!(extract_risk_score("no signal either way"), 0.5);
    }

    #[test]
    fn reasoning_spans_up_to_recommendation() {
        let analysis = "RISK_SCORE: 0.4\nREASONING: amounts fit the baseline\nRECOMMENDATION: approve";
        assert_eq!(extract_reasoning(analysis), "amounts fit the baseline");
        assert_eq!(extract_recommendation(analysis), "approve");
    }

    #[test]
    fn reasoning_without_marker_truncates_long_text() {
        let long = "x".repeat(250);
        let reasoning = extract_reasoning(&long);
        assert_eq!(reasoning.chars().count(), 203);
        assert!(reasoning.ends_with("..."));

        let short = "brief note";
        assert_eq!(extract_reasoning(short), short);
    }

    #[test]
    fn missing_recommendation_uses_standard_text() {
        assert_eq!(
            extract_recommendation("RISK_SCORE: 0.2"),
            "Standard fraud review recommended"
        );
    }
}
