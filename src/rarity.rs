/// Rarity ranking for a whole collection
///
/// The scorer is pluggable; `TraitFrequencyScorer` is the built-in one.
use crate::logger::{self, LogTag};
use crate::types::{TokenMetadata, Trait};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Ranks every token of one collection (1 = rarest)
///
/// Returns `None` when the collection cannot be ranked.
pub trait RarityScorer: Send + Sync {
    fn rank(&self, tokens: &[TokenMetadata]) -> Option<HashMap<String, u32>>;
}

/// Sum of inverse trait frequencies
///
/// A token scores `N / count(type, value)` for each of its traits. Higher
/// scores rank first; equal scores fall back to ascending token id.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraitFrequencyScorer;

impl RarityScorer for TraitFrequencyScorer {
    fn rank(&self, tokens: &[TokenMetadata]) -> Option<HashMap<String, u32>> {
        if tokens.len() < 2 || tokens.iter().all(|t| t.traits.is_empty()) {
            return None;
        }

        let mut frequencies: HashMap<&Trait, usize> = HashMap::new();
        for token in tokens {
            for t in &token.traits {
                *frequencies.entry(t).or_insert(0) += 1;
            }
        }

        let total = tokens.len() as f64;
        let mut scored: Vec<(&str, f64)> = tokens
            .iter()
            .map(|token| {
                let score: f64 = token
                    .traits
                    .iter()
                    .filter_map(|t| frequencies.get(t))
                    .map(|count| total / *count as f64)
                    .sum();
                (token.token_id.as_str(), score)
            })
            .collect();

        scored.sort_by(|(a_id, a_score), (b_id, b_score)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| compare_token_ids(a_id, b_id))
        });

        Some(
            scored
                .into_iter()
                .enumerate()
                .map(|(i, (id, _))| (id.to_string(), (i + 1) as u32))
                .collect(),
        )
    }
}

/// Numeric order for decimal ids of any length, string order otherwise
fn compare_token_ids(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit());
    if numeric(a) && numeric(b) {
        let a = a.trim_start_matches('0');
        let b = b.trim_start_matches('0');
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    } else {
        a.cmp(b)
    }
}

/// Overwrite ranks with the scorer's result
///
/// Tokens missing from the result keep their previous rank. Returns how
/// many tokens received a rank.
pub fn rerank(tokens: &mut [TokenMetadata], scorer: &dyn RarityScorer) -> usize {
    let Some(ranks) = scorer.rank(tokens) else {
        if let Some(first) = tokens.first() {
            logger::info(
                LogTag::Rarity,
                &format!(
                    "Could not rank {} ({} tokens); keeping existing ranks",
                    first.collection_id,
                    tokens.len()
                ),
            );
        }
        return 0;
    };

    let mut ranked = 0;
    for token in tokens.iter_mut() {
        if let Some(rank) = ranks.get(&token.token_id) {
            token.rarity_rank = Some(*rank);
            ranked += 1;
        }
    }
    ranked
}
