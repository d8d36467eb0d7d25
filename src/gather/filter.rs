//! Pure per-record acceptance decisions.
//!
//! The gather loop's control flow hinges on a three-way decision per
//! record: keep it, skip just this record, or stop the whole run. Keeping
//! that decision in a pure function keeps it testable apart from the
//! pagination and I/O around it.

use super::{CandidatePost, StopPolicy};

/// Why a single record was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The image is smaller than the policy minimums.
    BelowMinimumSize {
        /// The record's width.
        width: u32,
        /// The record's height.
        height: u32,
    },

    /// The post's score is below the policy minimum.
    BelowMinimumScore {
        /// The record's score.
        score: i64,
    },
}

/// The three-way decision for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordDecision {
    /// Accept the record.
    Keep,

    /// Reject this record only; later records may still qualify.
    Skip(SkipReason),

    /// The record predates the age cutoff. Listings are newest-first, so
    /// everything after it is older still: stop the entire run.
    Stop,
}

/// Evaluates one record against the policy.
///
/// Checks run in order: age cutoff (stops the run), then size, then score
/// (each skips the record). A post with an unknown score passes the score
/// check, since there is nothing to compare.
#[must_use]
pub fn evaluate<P: CandidatePost>(post: &P, policy: &StopPolicy) -> RecordDecision {
    if post.created_at() < policy.oldest_allowed {
        return RecordDecision::Stop;
    }

    if post.width() < policy.min_width || post.height() < policy.min_height {
        return RecordDecision::Skip(SkipReason::BelowMinimumSize {
            width: post.width(),
            height: post.height(),
        });
    }

    if let (Some(min_score), Some(score)) = (policy.min_score, post.score()) {
        if score < min_score {
            return RecordDecision::Skip(SkipReason::BelowMinimumScore { score });
        }
    }

    RecordDecision::Keep
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, Utc};

    use super::super::testutil::TestPost;
    use super::*;

    fn policy() -> StopPolicy {
        StopPolicy::new(10, Utc::now() - Duration::days(7))
    }

    #[test]
    fn test_fresh_valid_post_is_kept() {
        let post = TestPost::new(1);
        assert_eq!(evaluate(&post, &policy()), RecordDecision::Keep);
    }

    #[test]
    fn test_post_older_than_cutoff_stops_the_run() {
        let post = TestPost::new(1).with_created_at(Utc::now() - Duration::days(30));
        assert_eq!(evaluate(&post, &policy()), RecordDecision::Stop);
    }

    #[test]
    fn test_post_exactly_at_cutoff_is_kept() {
        let cutoff = Utc::now() - Duration::days(7);
        let post = TestPost::new(1).with_created_at(cutoff);
        let policy = StopPolicy::new(10, cutoff);
        // The cutoff is an inclusive lower bound.
        assert_eq!(evaluate(&post, &policy), RecordDecision::Keep);
    }

    #[test]
    fn test_undersized_post_is_skipped_not_stopped() {
        let post = TestPost::new(1).with_size(500, 2000);
        let policy = policy().with_min_dimensions(800, 800);
        assert_eq!(
            evaluate(&post, &policy),
            RecordDecision::Skip(SkipReason::BelowMinimumSize {
                width: 500,
                height: 2000
            })
        );
    }

    #[test]
    fn test_low_score_is_skipped() {
        let post = TestPost::new(1).with_score(Some(3));
        let policy = policy().with_min_score(50);
        assert_eq!(
            evaluate(&post, &policy),
            RecordDecision::Skip(SkipReason::BelowMinimumScore { score: 3 })
        );
    }

    #[test]
    fn test_unknown_score_passes_score_check() {
        let post = TestPost::new(1).with_score(None);
        let policy = policy().with_min_score(50);
        assert_eq!(evaluate(&post, &policy), RecordDecision::Keep);
    }

    #[test]
    fn test_age_cutoff_outranks_size_check() {
        // A record that is both too old and too small stops the run; the
        // cutoff is evaluated first because it ends everything.
        let post = TestPost::new(1)
            .with_created_at(Utc::now() - Duration::days(30))
            .with_size(1, 1);
        let policy = policy().with_min_dimensions(800, 800);
        assert_eq!(evaluate(&post, &policy), RecordDecision::Stop);
    }

    #[test]
    fn test_no_minimums_accepts_tiny_low_score_posts() {
        let post = TestPost::new(1).with_size(1, 1).with_score(Some(-5));
        assert_eq!(evaluate(&post, &policy()), RecordDecision::Keep);
    }
}
