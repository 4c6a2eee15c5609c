// src/core/identity/matcher.rs
use tracing::debug;

use super::types::{BiometricTemplate, IdentityId};
use crate::utils::config::{BiometricConfig, MatchPolicyKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchPolicy {
    /// Accept the first template, in store order, that clears the threshold.
    FirstMatch,
    /// Accept the highest-scoring template if it clears the threshold and
    /// beats the best template of any other identity by at least `margin`.
    BestMatch { margin: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub identity_id: IdentityId,
    pub score: f64,
}

/// Cosine similarity of two feature vectors. Empty, zero-norm or
/// mismatched-length inputs score 0 so they never clear a threshold.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0f64, 0f64, 0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

#[derive(Debug, Clone)]
pub struct Matcher {
    threshold: f64,
    policy: MatchPolicy,
}

impl Matcher {
    pub fn new(threshold: f64, policy: MatchPolicy) -> Self {
        Self { threshold, policy }
    }

    pub fn from_config(config: &BiometricConfig) -> Self {
        let policy = match config.match_policy {
            MatchPolicyKind::First => MatchPolicy::FirstMatch,
            MatchPolicyKind::Best => MatchPolicy::BestMatch { margin: config.best_match_margin },
        };
        Self::new(config.match_threshold, policy)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_match(&self, score: f64) -> bool {
        score >= self.threshold
    }

    /// Compares a query vector against one enrolled template.
    pub fn compare(&self, query: &[f32], template: &BiometricTemplate) -> Option<f64> {
        let score = cosine_similarity(query, &template.features);
        self.is_match(score).then_some(score)
    }

    /// Scans `templates` for the query vector according to the configured policy.
    pub fn find_match(&self, query: &[f32], templates: &[BiometricTemplate]) -> Option<MatchCandidate> {
        match self.policy {
            MatchPolicy::FirstMatch => templates.iter().find_map(|template| {
                self.compare(query, template).map(|score| MatchCandidate {
                    identity_id: template.identity_id.clone(),
                    score,
                })
            }),
            MatchPolicy::BestMatch { margin } => self.best_match(query, templates, margin),
        }
    }

    fn best_match(&self, query: &[f32], templates: &[BiometricTemplate], margin: f64) -> Option<MatchCandidate> {
        let scored: Vec<(&BiometricTemplate, f64)> = templates
            .iter()
            .map(|t| (t, cosine_similarity(query, &t.features)))
            .collect();

        let (best, best_score) = scored
            .iter()
            .copied()
            .reduce(|acc, item| if item.1 > acc.1 { item } else { acc })?;
        if !self.is_match(best_score) {
            return None;
        }

        let runner_up = scored
            .iter()
            .filter(|(t, _)| t.identity_id != best.identity_id)
            .map(|(_, score)| *score)
            .fold(f64::NEG_INFINITY, f64::max);

        if best_score - runner_up < margin {
            debug!(best_score, runner_up, margin, "best match not distinct enough");
            return None;
        }

        Some(MatchCandidate { identity_id: best.identity_id.clone(), score: best_score })
    }
}
