// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Greedy abbreviation selection over the literal text of a story.
//!
//! Text is appended segment by segment during assembly. Each segment adds
//! candidate substrings: every maximal run between delimiters, alone and with
//! one neighbouring delimiter on the left, the right or both sides. Selection
//! repeatedly takes the candidate saving the most Z-characters, then erases its
//! occurrences so later candidates are not credited for the same text.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::thread;

use log::debug;

use crate::core::text_encoding::{text_cost, ABBREVIATION_REF_COST};

const SENTINEL: u8 = 0;
const DELIMITERS: &[u8] = b" .,!?;:()-\"\n";

fn is_delimiter(byte: u8) -> bool {
    DELIMITERS.contains(&byte)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbbrevResult {
    pub savings: i64,
    pub count: usize,
    pub text: String,
}

/// Restore point for [`AbbrevFinder::rollback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    text_len: usize,
    candidate_count: usize,
}

#[derive(Debug, Default, Clone)]
pub struct AbbrevFinder {
    text: Vec<u8>,
    /// Candidate text to Z-characters saved per use.
    candidates: HashMap<String, u32>,
    order: Vec<String>,
}

impl AbbrevFinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text_len(&self) -> usize {
        self.text.len()
    }

    pub fn add_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(SENTINEL);
        }
        let start = self.text.len();
        self.text
            .extend(text.bytes().filter(|&byte| byte != SENTINEL));
        let end = self.text.len();
        self.collect_candidates(start, end);
    }

    fn collect_candidates(&mut self, start: usize, end: usize) {
        let mut pos = start;
        while pos < end {
            if is_delimiter(self.text[pos]) {
                pos += 1;
                continue;
            }
            let token_start = pos;
            while pos < end && !is_delimiter(self.text[pos]) {
                pos += 1;
            }
            let token_end = pos;
            let left = token_start > start;
            let right = token_end < end;
            self.offer(token_start, token_end);
            if left {
                self.offer(token_start - 1, token_end);
            }
            if right {
                self.offer(token_start, token_end + 1);
            }
            if left && right {
                self.offer(token_start - 1, token_end + 1);
            }
        }
    }

    fn offer(&mut self, start: usize, end: usize) {
        let Ok(text) = std::str::from_utf8(&self.text[start..end]) else {
            return;
        };
        if self.candidates.contains_key(text) {
            return;
        }
        let cost = text_cost(text);
        if cost <= ABBREVIATION_REF_COST {
            return;
        }
        let text = text.to_string();
        self.candidates
            .insert(text.clone(), cost - ABBREVIATION_REF_COST);
        self.order.push(text);
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            text_len: self.text.len(),
            candidate_count: self.order.len(),
        }
    }

    /// Forget text and candidates added after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.text.truncate(checkpoint.text_len);
        for text in self.order.drain(checkpoint.candidate_count.min(self.order.len())..) {
            self.candidates.remove(&text);
        }
    }

    /// Select up to `max` abbreviations, best first.
    pub fn results(self, max: usize) -> AbbrevResults {
        let mut candidates: Vec<(String, u32)> = self.candidates.into_iter().collect();
        candidates.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(
            "abbreviation search over {} bytes with {} candidates",
            self.text.len(),
            candidates.len()
        );
        AbbrevResults {
            text: self.text,
            candidates,
            remaining: max,
        }
    }
}

/// Iterator over selected abbreviations in non-increasing savings order.
#[derive(Debug)]
pub struct AbbrevResults {
    text: Vec<u8>,
    candidates: Vec<(String, u32)>,
    remaining: usize,
}

impl Iterator for AbbrevResults {
    type Item = AbbrevResult;

    fn next(&mut self) -> Option<AbbrevResult> {
        if self.remaining == 0 || self.candidates.is_empty() {
            return None;
        }
        let counts = count_all(&self.text, &self.candidates);
        let mut scored: Vec<(String, u32, usize, i64)> = self
            .candidates
            .drain(..)
            .zip(counts)
            .map(|((text, per_use), count)| {
                let savings = savings(count, per_use);
                (text, per_use, count, savings)
            })
            .filter(|(_, _, _, savings)| *savings > 0)
            .collect();
        let best = scored
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.3.cmp(&b.3)
                    .then(a.0.len().cmp(&b.0.len()))
                    .then(b.0.cmp(&a.0))
            })
            .map(|(idx, _)| idx)?;
        let (text, _, count, savings) = scored.swap_remove(best);
        self.candidates = scored
            .into_iter()
            .map(|(text, per_use, _, _)| (text, per_use))
            .collect();
        erase(&mut self.text, text.as_bytes());
        self.remaining -= 1;
        Some(AbbrevResult {
            savings,
            count,
            text,
        })
    }
}

fn savings(count: usize, per_use: u32) -> i64 {
    (count as i64 - 1) * i64::from(per_use) - i64::from(ABBREVIATION_REF_COST)
}

/// Non-overlapping occurrences of `needle` in `hay`.
pub fn count_occurrences(hay: &[u8], needle: &[u8]) -> usize {
    if needle.is_empty() || needle.len() > hay.len() {
        return 0;
    }
    let mut count = 0;
    let mut pos = 0;
    while pos + needle.len() <= hay.len() {
        if &hay[pos..pos + needle.len()] == needle {
            count += 1;
            pos += needle.len();
        } else {
            pos += 1;
        }
    }
    count
}

fn erase(hay: &mut [u8], needle: &[u8]) {
    if needle.is_empty() {
        return;
    }
    let mut pos = 0;
    while pos + needle.len() <= hay.len() {
        if &hay[pos..pos + needle.len()] == needle {
            hay[pos..pos + needle.len()].fill(SENTINEL);
            pos += needle.len();
        } else {
            pos += 1;
        }
    }
}

fn count_all(text: &[u8], candidates: &[(String, u32)]) -> Vec<usize> {
    count_with(text, candidates, count_occurrences)
}

/// Counts per candidate, in candidate order. A worker panic is re-raised.
fn count_with<F>(text: &[u8], candidates: &[(String, u32)], count: F) -> Vec<usize>
where
    F: Fn(&[u8], &[u8]) -> usize + Sync,
{
    let workers = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    let chunk_size = candidates.len().div_ceil(workers).max(1);
    let count = &count;
    thread::scope(|scope| {
        let handles: Vec<_> = candidates
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|(candidate, _)| count(text, candidate.as_bytes()))
                        .collect::<Vec<usize>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn tokens_and_delimiter_variants_become_candidates() {
        let mut finder = AbbrevFinder::new();
        finder.add_text("go north.");
        let mut names: Vec<&str> = finder.candidates.keys().map(String::as_str).collect();
        names.sort_unstable();
        // "go" costs 2 and is dropped; "go " costs 3.
        assert_eq!(
            names,
            vec![" north", " north.", "go ", "north", "north."]
        );
    }

    #[test]
    fn repeated_article_is_selected() {
        let mut finder = AbbrevFinder::new();
        finder.add_text("the cat sat on the mat by the door");
        let results: Vec<AbbrevResult> = finder.results(10).collect();
        assert_eq!(
            results,
            vec![AbbrevResult {
                savings: 2,
                count: 3,
                text: "the ".to_string()
            }]
        );
    }

    #[test]
    fn two_uses_of_the_article_do_not_cover_the_reference_cost() {
        let mut finder = AbbrevFinder::new();
        finder.add_text("the cat sat on the mat");
        // savings = (count - 1) * (cost - 2) - 2
        // "the " costs 4: (2 - 1) * 2 - 2 = 0. "the" costs 3: (2 - 1) * 1 - 2 = -1.
        assert_eq!(text_cost("the "), 4);
        assert_eq!(text_cost("the"), 3);
        assert!(finder.candidates.contains_key("the "));
        assert_eq!(finder.results(10).count(), 0);
    }

    #[test]
    fn counts_stay_in_candidate_order() {
        let candidates: Vec<(String, u32)> = (0..40)
            .map(|n| ("x".repeat(n % 5 + 1), 1))
            .collect();
        let counts = count_all(b"xxxxx", &candidates);
        let expected: Vec<usize> = (0..40).map(|n| 5 / (n % 5 + 1)).collect();
        assert_eq!(counts, expected);
    }

    #[test]
    #[should_panic(expected = "counter failed")]
    fn worker_panic_is_not_swallowed() {
        let candidates = vec![("lamp".to_string(), 2), ("sword".to_string(), 3)];
        count_with(b"lamp sword", &candidates, |_, needle| {
            if needle == b"sword" {
                panic!("counter failed");
            }
            1
        });
    }

    #[test]
    fn segments_do_not_join() {
        let mut finder = AbbrevFinder::new();
        finder.add_text("lamp");
        finder.add_text("lamp");
        finder.add_text("lamp");
        let text = String::from_utf8(finder.text.clone()).expect("ascii");
        assert_eq!(text, "lamp\0lamp\0lamp");
        let results: Vec<AbbrevResult> = finder.results(1).collect();
        assert_eq!(results[0].text, "lamp");
        assert_eq!(results[0].count, 3);
        assert_eq!(results[0].savings, 2 * 2 - 2);
    }

    #[test]
    fn rollback_forgets_later_text_and_candidates() {
        let mut finder = AbbrevFinder::new();
        finder.add_text("brass lantern");
        let checkpoint = finder.checkpoint();
        finder.add_text("elvish sword");
        assert!(finder.candidates.contains_key("sword"));
        finder.rollback(checkpoint);
        assert!(!finder.candidates.contains_key("sword"));
        assert!(finder.candidates.contains_key("lantern"));
        assert_eq!(finder.text_len(), "brass lantern".len());
    }

    #[test]
    fn max_limits_results() {
        let mut finder = AbbrevFinder::new();
        for _ in 0..5 {
            finder.add_text("You see a lamp here. You see a sword here.");
        }
        assert_eq!(finder.results(2).count(), 2);
    }

    #[test]
    fn counting_skips_overlaps() {
        assert_eq!(count_occurrences(b"aaaa", b"aa"), 2);
        assert_eq!(count_occurrences(b"abc", b"abcd"), 0);
    }

    proptest! {
        #[test]
        fn savings_never_increase(words in proptest::collection::vec("[a-z]{2,6}", 1..40)) {
            let mut finder = AbbrevFinder::new();
            let sentence = words.join(" ");
            finder.add_text(&sentence);
            finder.add_text(&sentence);
            let results = finder.results(16);
            let mut last = i64::MAX;
            for result in results {
                prop_assert!(result.savings <= last);
                prop_assert!(result.savings > 0);
                last = result.savings;
            }
        }

        #[test]
        fn erased_pattern_no_longer_matches(word in "[a-z]{4,8}", repeats in 3usize..10) {
            let mut finder = AbbrevFinder::new();
            for _ in 0..repeats {
                finder.add_text(&word);
            }
            let mut results = finder.results(1);
            let first = results.next();
            prop_assert!(first.is_some());
            prop_assert_eq!(count_occurrences(&results.text, word.as_bytes()), 0);
        }
    }
}
