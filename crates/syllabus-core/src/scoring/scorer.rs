use super::config::{ScoringConfig, ScoringWeights};
use super::relevance::keyword_relevance;
use crate::types::{ContentRecord, EngagementMetrics};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Contribution used whenever an input is unknown.
const NEUTRAL: f64 = 0.5;

/// Share of completeness driven by length; the rest comes from structure.
const LENGTH_SHARE: f64 = 0.6;

/// Five sub-scores in [0, 1] plus their weighted total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct QualityScore {
    pub relevance: f64,
    pub authority: f64,
    pub engagement: f64,
    pub freshness: f64,
    pub completeness: f64,
    pub total: f64,
}

impl QualityScore {
    /// Weighted sum of the sub-scores, clamped to [0, 1].
    pub fn weighted(
        weights: &ScoringWeights,
        relevance: f64,
        authority: f64,
        engagement: f64,
        freshness: f64,
        completeness: f64,
    ) -> Self {
        let total = relevance * weights.relevance
            + authority * weights.authority
            + engagement * weights.engagement
            + freshness * weights.freshness
            + completeness * weights.completeness;
        Self {
            relevance,
            authority,
            engagement,
            freshness,
            completeness,
            total: total.clamp(0.0, 1.0),
        }
    }
}

/// Outcome of the acceptance gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum GateDecision {
    Accept,
    Reject { total: f64, threshold: f64 },
}

impl GateDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, GateDecision::Accept)
    }
}

/// A score together with the gate verdict it produced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Assessment {
    pub score: QualityScore,
    pub decision: GateDecision,
}

/// Deterministic multi-factor quality scorer.
///
/// Every method is a pure function of the record and the configuration:
/// missing or malformed inputs fall back to neutral contributions and
/// never produce an error.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    config: ScoringConfig,
}

impl QualityScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a record, measuring age against its retrieval timestamp.
    pub fn score(&self, record: &ContentRecord) -> QualityScore {
        self.score_at(record, record.retrieved_at)
    }

    /// Score a record as of an arbitrary instant (periodic rescoring).
    pub fn score_at(&self, record: &ContentRecord, as_of: DateTime<Utc>) -> QualityScore {
        QualityScore::weighted(
            &self.config.weights,
            self.relevance(record),
            self.authority(&record.metrics),
            self.engagement(&record.metrics),
            self.freshness(&record.domain, record.published_at, as_of),
            self.completeness(record),
        )
    }

    /// Score and apply the gate.
    pub fn assess(&self, record: &ContentRecord) -> Assessment {
        let score = self.score(record);
        Assessment {
            score,
            decision: self.gate(&score),
        }
    }

    pub fn gate(&self, score: &QualityScore) -> GateDecision {
        if score.total >= self.config.gate_threshold {
            GateDecision::Accept
        } else {
            GateDecision::Reject {
                total: score.total,
                threshold: self.config.gate_threshold,
            }
        }
    }

    /// Score many records on the rayon pool. Output order matches input.
    pub fn assess_batch(&self, records: &[ContentRecord]) -> Vec<Assessment> {
        records.par_iter().map(|r| self.assess(r)).collect()
    }

    pub fn relevance(&self, record: &ContentRecord) -> f64 {
        if let Some(r) = record.relevance.filter(|r| r.is_finite()) {
            return r.clamp(0.0, 1.0);
        }
        record
            .query
            .as_deref()
            .and_then(|q| keyword_relevance(q, &record.title, &record.body, &record.tags))
            .unwrap_or(NEUTRAL)
    }

    pub fn authority(&self, metrics: &EngagementMetrics) -> f64 {
        let base = match metrics.followers.or(metrics.views) {
            Some(count) => {
                let count = count.max(1) as f64;
                (count.log10() / self.config.authority_ceiling.log10()).clamp(0.0, 1.0)
            }
            None => NEUTRAL,
        };
        let bonus = if metrics.verified.unwrap_or(false) {
            self.config.verified_bonus
        } else {
            0.0
        };
        (base + bonus).min(1.0)
    }

    pub fn engagement(&self, metrics: &EngagementMetrics) -> f64 {
        let likes = metrics
            .likes
            .or_else(|| metrics.score.map(|s| s.max(0) as u64));

        let like_ratio = match (likes, metrics.views) {
            (Some(likes), Some(views)) => {
                (likes as f64 / views.max(1) as f64 * self.config.like_ratio_scale).min(1.0)
            }
            _ => NEUTRAL,
        };

        let comment_density = match metrics.comments {
            Some(c) => ((c as f64 + 1.0).log10() / self.config.comment_ceiling.log10()).min(1.0),
            None => NEUTRAL,
        };

        ((like_ratio + comment_density) / 2.0).clamp(0.0, 1.0)
    }

    pub fn freshness(
        &self,
        domain: &str,
        published_at: Option<DateTime<Utc>>,
        as_of: DateTime<Utc>,
    ) -> f64 {
        let Some(published) = published_at else {
            return NEUTRAL;
        };
        let age_days = ((as_of - published).num_seconds().max(0) as f64) / 86_400.0;
        let half_life = self.config.half_life_for(domain);
        0.5f64.powf(age_days / half_life).clamp(0.0, 1.0)
    }

    pub fn completeness(&self, record: &ContentRecord) -> f64 {
        let words = record.body.split_whitespace().count();
        let length = (words as f64 / self.config.completeness_word_target as f64).min(1.0);

        let signals = [
            has_headers(&record.body),
            has_code_blocks(&record.body),
            record.has_captions,
        ];
        let structure = signals.iter().filter(|s| **s).count() as f64 / signals.len() as f64;

        (LENGTH_SHARE * length + (1.0 - LENGTH_SHARE) * structure).clamp(0.0, 1.0)
    }
}

fn has_headers(body: &str) -> bool {
    body.lines().any(|line| {
        let line = line.trim_start();
        line.starts_with('#') || line.to_ascii_lowercase().starts_with("<h")
    })
}

fn has_code_blocks(body: &str) -> bool {
    body.contains("```") || body.contains("<pre") || body.contains("<code")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Difficulty, Platform};
    use chrono::Duration;
    use proptest::prelude::*;

    fn record(body: &str) -> ContentRecord {
        ContentRecord::new(
            "https://example.com/lesson",
            Platform::Youtube,
            "CODING_SOFTWARE",
            Difficulty::Beginner,
            "Python basics",
            body,
        )
    }

    fn long_body(words: usize) -> String {
        let mut body = String::from("# Lesson\n\n```python\nprint('hi')\n```\n");
        for i in 0..words {
            body.push_str(&format!("word{} ", i));
        }
        body
    }

    #[test]
    fn test_high_quality_record_scores_above_point_seven() {
        let scorer = QualityScorer::default();
        let retrieved = Utc::now();
        let rec = record(&long_body(600))
            .with_captions(true)
            .with_retrieved_at(retrieved)
            .with_published_at(retrieved - Duration::days(10))
            .with_metrics(EngagementMetrics {
                views: Some(1_000_000),
                likes: Some(50_000),
                comments: Some(5_000),
                verified: Some(true),
                ..Default::default()
            });

        let score = scorer.score(&rec);
        assert!(score.total > 0.7, "total was {}", score.total);
        assert_eq!(score.authority, 1.0);
        assert_eq!(score.engagement, 1.0);
        assert!(scorer.gate(&score).is_accept());
    }

    #[test]
    fn test_ten_word_body_completeness_near_zero() {
        let scorer = QualityScorer::default();
        let rec = record("one two three four five six seven eight nine ten");
        let c = scorer.completeness(&rec);
        assert!(c < 0.05, "completeness was {}", c);
    }

    #[test]
    fn test_missing_everything_is_neutral() {
        let scorer = QualityScorer::default();
        let rec = record("");
        let score = scorer.score(&rec);
        assert_eq!(score.relevance, 0.5);
        assert_eq!(score.authority, 0.5);
        assert_eq!(score.engagement, 0.5);
        assert_eq!(score.freshness, 0.5);
        assert_eq!(score.completeness, 0.0);
    }

    #[test]
    fn test_non_finite_relevance_treated_as_absent() {
        let scorer = QualityScorer::default();
        let rec = record("body").with_relevance(f64::NAN);
        assert_eq!(scorer.relevance(&rec), 0.5);
        let rec = record("body").with_relevance(1.4);
        assert_eq!(scorer.relevance(&rec), 1.0);
    }

    #[test]
    fn test_query_keyword_fallback() {
        let scorer = QualityScorer::default();
        let rec = record("Unrelated").with_query("python basics");
        assert!((scorer.relevance(&rec) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_authority_prefers_followers_over_views() {
        let scorer = QualityScorer::default();
        let metrics = EngagementMetrics {
            views: Some(3_000_000),
            followers: Some(10),
            ..Default::default()
        };
        assert!(scorer.authority(&metrics) < 0.2);
    }

    #[test]
    fn test_likes_fall_back_to_net_score() {
        let scorer = QualityScorer::default();
        let metrics = EngagementMetrics {
            views: Some(1_000),
            score: Some(100),
            comments: None,
            ..Default::default()
        };
        // like ratio saturates, comments neutral
        assert!((scorer.engagement(&metrics) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_future_publication_clamps_to_fresh() {
        let scorer = QualityScorer::default();
        let now = Utc::now();
        let f = scorer.freshness("MUSIC", Some(now + Duration::days(30)), now);
        assert_eq!(f, 1.0);
    }

    #[test]
    fn test_half_life_halves_freshness() {
        let scorer = QualityScorer::default();
        let now = Utc::now();
        let f = scorer.freshness("CODING_SOFTWARE", Some(now - Duration::days(365)), now);
        assert!((f - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_score_is_deterministic() {
        let scorer = QualityScorer::default();
        let rec = record(&long_body(50)).with_published_at(Utc::now() - Duration::days(90));
        assert_eq!(scorer.score(&rec), scorer.score(&rec));
    }

    #[test]
    fn test_gate_rejects_below_threshold() {
        let scorer = QualityScorer::new(ScoringConfig::default().with_gate_threshold(0.9));
        let decision = scorer.assess(&record("short")).decision;
        assert!(matches!(decision, GateDecision::Reject { threshold, .. } if threshold == 0.9));
    }

    #[test]
    fn test_batch_preserves_order() {
        let scorer = QualityScorer::default();
        let records: Vec<_> = (0..20).map(|i| record(&long_body(i * 30))).collect();
        let batch = scorer.assess_batch(&records);
        for (rec, assessed) in records.iter().zip(batch.iter()) {
            assert_eq!(scorer.score(rec), assessed.score);
        }
    }

    proptest! {
        #[test]
        fn prop_score_bounded_and_weighted(
            views in proptest::option::of(0u64..100_000_000),
            likes in proptest::option::of(0u64..10_000_000),
            comments in proptest::option::of(0u64..1_000_000),
            followers in proptest::option::of(0u64..100_000_000),
            verified in proptest::option::of(any::<bool>()),
            relevance in proptest::option::of(-2.0f64..2.0),
            words in 0usize..1200,
            age_days in proptest::option::of(-100i64..10_000),
        ) {
            let scorer = QualityScorer::default();
            let now = Utc::now();
            let mut rec = record(&long_body(words)).with_retrieved_at(now).with_metrics(EngagementMetrics {
                views, likes, comments, followers, verified, score: None,
            });
            rec.relevance = relevance;
            rec.published_at = age_days.map(|d| now - Duration::days(d));

            let s = scorer.score(&rec);
            for v in [s.relevance, s.authority, s.engagement, s.freshness, s.completeness, s.total] {
                prop_assert!((0.0..=1.0).contains(&v));
            }
            let w = &scorer.config().weights;
            let expected = s.relevance * w.relevance + s.authority * w.authority
                + s.engagement * w.engagement + s.freshness * w.freshness
                + s.completeness * w.completeness;
            prop_assert!((s.total - expected.clamp(0.0, 1.0)).abs() < 1e-9);
        }

        #[test]
        fn prop_freshness_monotonic_in_age(a in 0i64..20_000, b in 0i64..20_000) {
            let scorer = QualityScorer::default();
            let now = Utc::now();
            let (younger, older) = if a <= b { (a, b) } else { (b, a) };
            let fy = scorer.freshness("MUSIC", Some(now - Duration::days(younger)), now);
            let fo = scorer.freshness("MUSIC", Some(now - Duration::days(older)), now);
            prop_assert!(fy >= fo);
        }
    }
}
