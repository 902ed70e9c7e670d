use std::collections::HashMap;

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder, escape};

use crate::model::{MatchCandidate, MatchKind};

/// Identifiers longer than this are skipped by the fuzzy pass; the
/// insertion-variant set grows as (length + 1) x 36 and long keys are
/// already distinctive enough for the exact passes.
pub const MAX_FUZZY_IDENTIFIER_LEN: usize = 24;

/// Symbols an OCR engine commonly confuses for each other.
fn confusable_alternates(character: char) -> &'static [char] {
    match character {
        '0' => &['O', 'Q', 'D'],
        'O' => &['0', 'Q', 'D'],
        'Q' => &['0', 'O'],
        'D' => &['0', 'O'],
        '1' => &['l', 'I', '|'],
        'l' => &['1', 'I'],
        'I' => &['1', 'l'],
        '|' => &['1', 'I'],
        '5' => &['S'],
        'S' => &['5'],
        '8' => &['B'],
        'B' => &['8'],
        '6' => &['G', 'b'],
        'G' => &['6'],
        'b' => &['6'],
        '2' => &['Z'],
        'Z' => &['2'],
        _ => &[],
    }
}

const INSERTION_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Matches page text against the known identifier set in strict
/// priority order: exact substring, word-boundary regex, OCR-confusion
/// fuzzy variants. Short-circuits on the first hit.
pub struct IdentifierMatcher {
    identifiers: Vec<String>,
    uppercased: Vec<String>,
    boundary_patterns: Vec<Regex>,
    fuzzy_enabled: bool,
    variant_cache: HashMap<String, Vec<String>>,
}

impl IdentifierMatcher {
    /// Candidates are sorted by descending length (ties broken
    /// lexicographically) so that when one identifier is a substring of
    /// another, the longer one wins deterministically.
    pub fn new(identifiers: &[String], fuzzy_enabled: bool) -> Result<Self> {
        let mut ordered: Vec<String> = identifiers
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        ordered.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        ordered.dedup();

        let uppercased = ordered.iter().map(|id| id.to_uppercase()).collect();

        let boundary_patterns = ordered
            .iter()
            .map(|id| {
                RegexBuilder::new(&format!(r"\b{}\b", escape(id)))
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("failed to build boundary pattern for '{id}'"))
            })
            .collect::<Result<Vec<Regex>>>()?;

        Ok(Self {
            identifiers: ordered,
            uppercased,
            boundary_patterns,
            fuzzy_enabled,
            variant_cache: HashMap::new(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    pub fn match_page(&mut self, page_text: &str) -> Option<MatchCandidate> {
        if page_text.trim().is_empty() {
            return None;
        }

        let upper_text = page_text.to_uppercase();

        for (identifier, upper_id) in self.identifiers.iter().zip(&self.uppercased) {
            if upper_text.contains(upper_id.as_str()) {
                return Some(MatchCandidate {
                    candidate_id: identifier.clone(),
                    variant_used: identifier.clone(),
                    kind: MatchKind::Exact,
                });
            }
        }

        for (identifier, pattern) in self.identifiers.iter().zip(&self.boundary_patterns) {
            if pattern.is_match(page_text) {
                return Some(MatchCandidate {
                    candidate_id: identifier.clone(),
                    variant_used: identifier.clone(),
                    kind: MatchKind::WordBoundary,
                });
            }
        }

        if !self.fuzzy_enabled {
            return None;
        }

        // Last-resort pass: runs at most once per unmatched page.
        for index in 0..self.identifiers.len() {
            let identifier = self.identifiers[index].clone();
            if identifier.len() > MAX_FUZZY_IDENTIFIER_LEN {
                continue;
            }

            let variants = self
                .variant_cache
                .entry(identifier.clone())
                .or_insert_with(|| generate_variants(&identifier));

            for variant in variants.iter() {
                if upper_text.contains(&variant.to_uppercase()) {
                    return Some(MatchCandidate {
                        candidate_id: identifier.clone(),
                        variant_used: variant.clone(),
                        kind: MatchKind::Fuzzy,
                    });
                }
            }
        }

        None
    }
}

/// All single-edit OCR-confusion variants of an identifier: one
/// substitution per confusable position, one deletion per position, and
/// one insertion of each of A-Z0-9 at every insertion point. The
/// unmodified identifier is always included and the list is
/// deduplicated.
pub fn generate_variants(identifier: &str) -> Vec<String> {
    let chars: Vec<char> = identifier.chars().collect();
    let mut variants = vec![identifier.to_string()];

    for (position, &character) in chars.iter().enumerate() {
        for &alternate in confusable_alternates(character) {
            let mut variant = chars.clone();
            variant[position] = alternate;
            variants.push(variant.into_iter().collect());
        }
    }

    for position in 0..chars.len() {
        let mut variant = chars.clone();
        variant.remove(position);
        variants.push(variant.into_iter().collect());
    }

    for position in 0..=chars.len() {
        for &inserted in INSERTION_ALPHABET {
            let mut variant = chars.clone();
            variant.insert(position, inserted as char);
            variants.push(variant.into_iter().collect());
        }
    }

    variants.sort();
    variants.dedup();
    variants
}
