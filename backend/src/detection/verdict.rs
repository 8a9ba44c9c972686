use shared::{ClassificationView, DetectResponse};

use super::classifier::ClassificationItem;
use crate::config::VerdictConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub is_ai_generated: bool,
    /// 0-100, derived from label scores. Not a calibrated probability.
    pub confidence: f64,
    pub top_classifications: Vec<ClassificationView>,
}

impl From<Verdict> for DetectResponse {
    fn from(verdict: Verdict) -> Self {
        Self {
            is_ai_generated: verdict.is_ai_generated,
            confidence: verdict.confidence,
            classifications: verdict.top_classifications,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerdictMapper {
    indicators: Vec<String>,
    threshold: f64,
    top_classifications: usize,
}

#[cfg(test)]
impl Default for VerdictMapper {
    fn default() -> Self {
        Self::new(&VerdictConfig::default())
    }
}

impl VerdictMapper {
    pub fn new(config: &VerdictConfig) -> Self {
        Self {
            indicators: config
                .indicators
                .iter()
                .map(|indicator| indicator.to_lowercase())
                .collect(),
            threshold: config.threshold,
            top_classifications: config.top_classifications,
        }
    }

    fn is_indicative(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.indicators
            .iter()
            .any(|indicator| label.contains(indicator.as_str()))
    }

    /// Highest indicative score, else the first item's score, scaled to 0-100.
    pub fn confidence(&self, items: &[ClassificationItem]) -> f64 {
        let indicative = items
            .iter()
            .filter(|item| self.is_indicative(&item.label))
            .map(|item| item.score)
            .fold(None, |best: Option<f64>, score| {
                Some(best.map_or(score, |best| best.max(score)))
            });

        // The fallback treats the top label's score as AI likelihood.
        let score = indicative
            .or_else(|| items.first().map(|item| item.score))
            .unwrap_or(0.0);
        score * 100.0
    }

    pub fn is_ai_generated(&self, confidence: f64) -> bool {
        confidence > self.threshold
    }

    pub fn map(&self, items: &[ClassificationItem]) -> Verdict {
        let confidence = self.confidence(items);
        Verdict {
            is_ai_generated: self.is_ai_generated(confidence),
            confidence,
            top_classifications: items
                .iter()
                .take(self.top_classifications)
                .map(|item| ClassificationView {
                    label: item.label.clone(),
                    score: format_percentage(item.score),
                })
                .collect(),
        }
    }
}

pub fn format_percentage(score: f64) -> String {
    format!("{:.2}%", score * 100.0)
}
