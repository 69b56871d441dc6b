//! Phase-weighted progress calculation
//!
//! A collection task moves through three sequential phases — source
//! validation, post listing, comment listing — each contributing a fixed
//! weight to the overall percentage. This module is pure: it maps raw
//! per-phase counters into a normalized snapshot and performs no I/O.
//!
//! Phase totals may be estimates supplied by the caller (the comment total
//! is not knowable up front); progress is therefore clamped so a phase can
//! never report more than 100%, and [`PhaseCounters::validate`] surfaces
//! over-collection as warnings rather than errors.

use crate::config::CollectionConfig;
use crate::error::{Error, Result};
use crate::types::Phase;
use serde::{Deserialize, Serialize};

/// Default weight of the source-validation phase
pub const GROUPS_WEIGHT: f64 = 0.10;
/// Default weight of the post-listing phase
pub const POSTS_WEIGHT: f64 = 0.30;
/// Default weight of the comment-listing phase
pub const COMMENTS_WEIGHT: f64 = 0.60;

/// Relative weight of each collection phase; must sum to 1.0
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseWeights {
    /// Weight of the source-validation phase
    pub groups: f64,
    /// Weight of the post-listing phase
    pub posts: f64,
    /// Weight of the comment-listing phase
    pub comments: f64,
}

impl Default for PhaseWeights {
    fn default() -> Self {
        Self {
            groups: GROUPS_WEIGHT,
            posts: POSTS_WEIGHT,
            comments: COMMENTS_WEIGHT,
        }
    }
}

impl PhaseWeights {
    /// Build weights from configuration, rejecting sets that do not sum to 1.0
    pub fn from_config(config: &CollectionConfig) -> Result<Self> {
        let weights = Self {
            groups: config.groups_weight,
            posts: config.posts_weight,
            comments: config.comments_weight,
        };
        let sum = weights.groups + weights.posts + weights.comments;
        if (sum - 1.0).abs() > 1e-9 {
            return Err(Error::Config {
                message: format!("phase weights must sum to 1.0, got {sum}"),
                key: Some("collection.groups_weight".to_string()),
            });
        }
        Ok(weights)
    }
}

/// Raw per-phase counters for one task
///
/// Totals are fixed at run start (the posts and comments totals are
/// upper-bound estimates derived from the per-source cap); processed counts
/// only ever increase. With fixed totals and non-decreasing processed
/// counts, the computed percentage is monotonically non-decreasing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCounters {
    /// Number of submitted sources
    pub groups_total: u64,
    /// Sources fully processed so far
    pub groups_processed: u64,
    /// Estimated total posts (sources × per-source cap)
    pub posts_total: u64,
    /// Posts collected so far
    pub posts_processed: u64,
    /// Estimated total comment-listing units (one per potential post)
    pub comments_total: u64,
    /// Posts whose comment listing has completed
    pub comments_processed: u64,
}

impl PhaseCounters {
    /// Report a human-readable warning for every phase where the processed
    /// count exceeds the total
    ///
    /// Such a state means an upstream estimate was wrong. The snapshot
    /// clamps the affected phase at 100%, so this is a diagnostic aid, not
    /// an error.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for (label, processed, total) in [
            ("groups", self.groups_processed, self.groups_total),
            ("posts", self.posts_processed, self.posts_total),
            ("comments", self.comments_processed, self.comments_total),
        ] {
            if processed > total {
                warnings.push(format!(
                    "{label} phase processed {processed} of an estimated {total}; progress clamped at 100%"
                ));
            }
        }
        warnings
    }
}

/// Progress of one phase within a snapshot
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseProgress {
    /// This phase's weight in the overall percentage
    pub weight: f64,
    /// Fraction complete, clamped to 0.0..=1.0
    pub progress: f64,
    /// True once the phase reached 100%
    pub completed: bool,
}

/// Per-phase breakdown of a progress snapshot
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseBreakdown {
    /// Source-validation phase
    pub groups: PhaseProgress,
    /// Post-listing phase
    pub posts: PhaseProgress,
    /// Comment-listing phase
    pub comments: PhaseProgress,
}

/// Normalized progress of one task at a point in time
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Overall percentage, 0..=100
    pub percentage: u8,
    /// First non-completed phase in groups → posts → comments order
    /// (comments once everything is complete)
    pub phase: Phase,
    /// Per-phase progress and weights
    pub phases: PhaseBreakdown,
}

impl ProgressSnapshot {
    /// The all-phases-complete snapshot
    ///
    /// Used for tasks that already reached `completed`: their totals were
    /// estimates, so recomputing from counters could report less than 100%.
    pub fn completed(weights: &PhaseWeights) -> Self {
        let done = |weight| PhaseProgress {
            weight,
            progress: 1.0,
            completed: true,
        };
        Self {
            percentage: 100,
            phase: Phase::Comments,
            phases: PhaseBreakdown {
                groups: done(weights.groups),
                posts: done(weights.posts),
                comments: done(weights.comments),
            },
        }
    }

    /// Compute a snapshot from raw counters
    pub fn compute(weights: &PhaseWeights, counters: &PhaseCounters) -> Self {
        let groups = phase_progress(
            weights.groups,
            counters.groups_processed,
            counters.groups_total,
        );
        let posts = phase_progress(
            weights.posts,
            counters.posts_processed,
            counters.posts_total,
        );
        let comments = phase_progress(
            weights.comments,
            counters.comments_processed,
            counters.comments_total,
        );

        let weighted = groups.weight * groups.progress
            + posts.weight * posts.progress
            + comments.weight * comments.progress;
        let percentage = (weighted * 100.0).round().clamp(0.0, 100.0) as u8;

        let phase = if !groups.completed {
            Phase::Groups
        } else if !posts.completed {
            Phase::Posts
        } else {
            Phase::Comments
        };

        Self {
            percentage,
            phase,
            phases: PhaseBreakdown {
                groups,
                posts,
                comments,
            },
        }
    }
}

/// Progress of a single phase: `processed/total` clamped to 1.0; a phase
/// with no expected work counts as complete as soon as anything was
/// processed, and as untouched otherwise
fn phase_progress(weight: f64, processed: u64, total: u64) -> PhaseProgress {
    let progress = if total > 0 {
        (processed as f64 / total as f64).min(1.0)
    } else if processed > 0 {
        1.0
    } else {
        0.0
    };
    PhaseProgress {
        weight,
        progress,
        completed: progress >= 1.0,
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn counters(
        groups: (u64, u64),
        posts: (u64, u64),
        comments: (u64, u64),
    ) -> PhaseCounters {
        PhaseCounters {
            groups_processed: groups.0,
            groups_total: groups.1,
            posts_processed: posts.0,
            posts_total: posts.1,
            comments_processed: comments.0,
            comments_total: comments.1,
        }
    }

    #[test]
    fn default_weights_sum_to_one() {
        let w = PhaseWeights::default();
        assert_eq!(w.groups + w.posts + w.comments, 1.0);
    }

    #[test]
    fn from_config_rejects_bad_weight_sum() {
        let config = CollectionConfig {
            groups_weight: 0.5,
            posts_weight: 0.5,
            comments_weight: 0.5,
            ..CollectionConfig::default()
        };
        let err = PhaseWeights::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("must sum to 1.0"));
    }

    #[test]
    fn fresh_task_is_zero_percent_in_groups_phase() {
        let snapshot =
            ProgressSnapshot::compute(&PhaseWeights::default(), &counters((0, 5), (0, 50), (0, 50)));
        assert_eq!(snapshot.percentage, 0);
        assert_eq!(snapshot.phase, Phase::Groups);
        assert!(!snapshot.phases.groups.completed);
    }

    #[test]
    fn finished_task_is_one_hundred_percent() {
        let snapshot = ProgressSnapshot::compute(
            &PhaseWeights::default(),
            &counters((5, 5), (50, 50), (50, 50)),
        );
        assert_eq!(snapshot.percentage, 100);
        assert_eq!(snapshot.phase, Phase::Comments);
        assert!(snapshot.phases.comments.completed);
    }

    #[test]
    fn mid_posts_phase_matches_weighted_sum() {
        // groups done (10%), posts 200/500 (30% * 0.4 = 12%), comments untouched
        let snapshot = ProgressSnapshot::compute(
            &PhaseWeights::default(),
            &counters((10, 10), (200, 500), (0, 500)),
        );
        assert_eq!(snapshot.percentage, 22);
        assert_eq!(snapshot.phase, Phase::Posts);
    }

    #[test]
    fn over_collection_is_clamped_to_phase_maximum() {
        // 15 posts collected against an estimate of 10
        let snapshot = ProgressSnapshot::compute(
            &PhaseWeights::default(),
            &counters((1, 1), (15, 10), (0, 10)),
        );
        assert_eq!(snapshot.phases.posts.progress, 1.0);
        assert!(snapshot.phases.posts.completed);
        // 10% + 30% + 0%
        assert_eq!(snapshot.percentage, 40);
    }

    #[test]
    fn validate_warns_on_processed_exceeding_total() {
        let warnings = counters((1, 1), (15, 10), (0, 10)).validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("posts"));
        assert!(warnings[0].contains("15"));

        let warnings = counters((2, 1), (15, 10), (20, 10)).validate();
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn validate_is_quiet_when_counters_are_sane() {
        assert!(counters((1, 2), (5, 10), (3, 10)).validate().is_empty());
    }

    #[test]
    fn zero_total_phase_completes_once_anything_is_processed() {
        // comments_total 0: untouched reports 0, any work reports complete
        let untouched = ProgressSnapshot::compute(
            &PhaseWeights::default(),
            &counters((1, 1), (5, 5), (0, 0)),
        );
        assert_eq!(untouched.phases.comments.progress, 0.0);

        let touched = ProgressSnapshot::compute(
            &PhaseWeights::default(),
            &counters((1, 1), (5, 5), (3, 0)),
        );
        assert_eq!(touched.phases.comments.progress, 1.0);
        assert_eq!(touched.percentage, 100);
    }

    #[test]
    fn empty_task_reports_zero_in_groups_phase() {
        let snapshot =
            ProgressSnapshot::compute(&PhaseWeights::default(), &counters((0, 0), (0, 0), (0, 0)));
        assert_eq!(snapshot.percentage, 0);
        assert_eq!(snapshot.phase, Phase::Groups);
    }

    #[test]
    fn percentage_is_monotonic_over_a_run() {
        // Simulate a 3-source run with fixed totals and increasing processed counts
        let weights = PhaseWeights::default();
        let steps = [
            counters((0, 3), (0, 30), (0, 30)),
            counters((1, 3), (4, 30), (0, 30)),
            counters((1, 3), (4, 30), (4, 30)),
            counters((2, 3), (14, 30), (10, 30)),
            counters((3, 3), (24, 30), (24, 30)),
            counters((3, 3), (30, 30), (30, 30)),
        ];

        let mut last = 0;
        for (i, step) in steps.iter().enumerate() {
            let snapshot = ProgressSnapshot::compute(&weights, step);
            assert!(
                snapshot.percentage >= last,
                "step {i}: percentage {} regressed below {last}",
                snapshot.percentage
            );
            last = snapshot.percentage;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn phase_label_advances_in_fixed_order() {
        let weights = PhaseWeights::default();

        let in_groups =
            ProgressSnapshot::compute(&weights, &counters((1, 3), (0, 30), (0, 30)));
        assert_eq!(in_groups.phase, Phase::Groups);

        let in_posts = ProgressSnapshot::compute(&weights, &counters((3, 3), (10, 30), (0, 30)));
        assert_eq!(in_posts.phase, Phase::Posts);

        let in_comments =
            ProgressSnapshot::compute(&weights, &counters((3, 3), (30, 30), (10, 30)));
        assert_eq!(in_comments.phase, Phase::Comments);
    }

    #[test]
    fn snapshot_serializes_with_phase_breakdown() {
        let snapshot = ProgressSnapshot::compute(
            &PhaseWeights::default(),
            &counters((10, 10), (200, 500), (0, 500)),
        );
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["percentage"], 22);
        assert_eq!(json["phase"], "posts");
        assert_eq!(json["phases"]["groups"]["completed"], true);
        assert_eq!(json["phases"]["posts"]["weight"], 0.3);
    }
}
