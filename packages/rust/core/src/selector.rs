//! Diversity-aware candidate selection.
//!
//! Candidates are partitioned into three tiers by normalized domain:
//!
//! 1. **Fresh**: neither seen in this niche nor saved by the owner.
//! 2. **Repeat**: seen in this niche, not saved.
//! 3. **Saved fallback**: saved by the owner (seen or not).
//!
//! Tiers are drained strictly in order. Shuffling, when enabled, only
//! reorders members within a tier.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use prospector_shared::{CompanyCandidate, DomainSet, normalize_website};

/// Which tier a selected candidate was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionTier {
    Fresh,
    Repeat,
    SavedFallback,
}

impl SelectionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Repeat => "repeat",
            Self::SavedFallback => "saved",
        }
    }
}

/// Per-tier counts for one selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionStats {
    /// The desired count passed in.
    pub requested: usize,
    /// Selected from tier 1.
    pub fresh: usize,
    /// Selected from tier 3 (domains the owner saved).
    pub repeat_unseen_saved: usize,
    /// Selected from tier 2.
    pub repeat_seen: usize,
    /// True when at least one saved-domain candidate was needed.
    pub fallback_used: bool,
}

/// Result of one selection.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub selected: Vec<CompanyCandidate>,
    /// Tier of each entry in `selected`, index-aligned.
    pub tiers: Vec<SelectionTier>,
    pub stats: SelectionStats,
}

impl Selection {
    /// Normalized domains of the selected candidates, blanks omitted.
    pub fn domains(&self) -> Vec<String> {
        self.selected
            .iter()
            .map(|c| normalize_website(c.website.as_deref()))
            .filter(|d| !d.is_empty())
            .collect()
    }
}

/// Select up to `desired_count` candidates, preferring fresh domains.
///
/// Uses the thread-local RNG when `randomize` is set.
pub fn select(
    candidates: &[CompanyCandidate],
    seen: &DomainSet,
    desired_count: usize,
    randomize: bool,
    saved: &DomainSet,
) -> Selection {
    select_with_rng(
        candidates,
        seen,
        desired_count,
        randomize,
        saved,
        &mut rand::thread_rng(),
    )
}

/// [`select`] with an explicit random source.
pub fn select_with_rng<R: Rng + ?Sized>(
    candidates: &[CompanyCandidate],
    seen: &DomainSet,
    desired_count: usize,
    randomize: bool,
    saved: &DomainSet,
    rng: &mut R,
) -> Selection {
    let mut fresh = Vec::new();
    let mut repeat = Vec::new();
    let mut fallback = Vec::new();

    for candidate in candidates {
        let domain = normalize_website(candidate.website.as_deref());
        if saved.contains(&domain) {
            fallback.push(candidate);
        } else if seen.contains(&domain) {
            repeat.push(candidate);
        } else {
            fresh.push(candidate);
        }
    }

    if randomize {
        fresh.shuffle(rng);
        repeat.shuffle(rng);
        fallback.shuffle(rng);
    }

    let mut selection = Selection {
        stats: SelectionStats {
            requested: desired_count,
            ..Default::default()
        },
        ..Default::default()
    };

    for (tier, members) in [
        (SelectionTier::Fresh, fresh),
        (SelectionTier::Repeat, repeat),
        (SelectionTier::SavedFallback, fallback),
    ] {
        for candidate in members {
            if selection.selected.len() >= desired_count {
                return selection;
            }
            match tier {
                SelectionTier::Fresh => selection.stats.fresh += 1,
                SelectionTier::Repeat => selection.stats.repeat_seen += 1,
                SelectionTier::SavedFallback => {
                    selection.stats.repeat_unseen_saved += 1;
                    selection.stats.fallback_used = true;
                }
            }
            selection.selected.push(candidate.clone());
            selection.tiers.push(tier);
        }
    }

    selection
}
