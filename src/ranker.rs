// src/ranker.rs
use alloy::primitives::Address;

use crate::models::{LeaderboardEntry, RankCandidate, RankedPage};

/// Rank every candidate and cut out the page starting at `page_offset`.
///
/// Non-positive metrics never rank. The sort is stable so tied accounts keep
/// their input order between refreshes.
pub fn rank(entries: Vec<RankCandidate>, page_size: usize, page_offset: usize) -> RankedPage {
    let mut qualifying: Vec<RankCandidate> = entries
        .into_iter()
        .filter(|e| e.metric.is_positive())
        .collect();
    qualifying.sort_by(|a, b| b.metric.cmp(&a.metric));

    let window = qualifying
        .into_iter()
        .skip(page_offset)
        .take(page_size.saturating_add(1))
        .collect();

    rank_window(window, page_size, page_offset)
}

/// Rank a window the data source already positioned at `page_offset`,
/// fetched with `page_size + 1` rows so the extra row signals a next page.
pub fn rank_window(window: Vec<RankCandidate>, page_size: usize, page_offset: usize) -> RankedPage {
    let mut window: Vec<RankCandidate> = window
        .into_iter()
        .filter(|e| e.metric.is_positive())
        .collect();
    window.sort_by(|a, b| b.metric.cmp(&a.metric));

    let has_next_page = window.len() > page_size;
    let page = window
        .into_iter()
        .take(page_size)
        .enumerate()
        .map(|(i, candidate)| LeaderboardEntry {
            rank: page_offset + i + 1,
            account: candidate.account,
            metric: candidate.metric,
            is_current_user: false,
        })
        .collect();

    RankedPage { page, has_next_page }
}

impl RankedPage {
    pub fn mark_viewer(mut self, viewer: &Address) -> Self {
        for entry in &mut self.page {
            entry.is_current_user = entry.account == *viewer;
        }
        self
    }
}
