//! Platform-specific metric shapes and their normalization into the common
//! [`EngagementMetrics`] bag consumed by the scorer.
//!
//! Crawler adapters hand over one of the tagged variants below (or raw JSON
//! through [`metrics_from_json`]); anything negative, non-finite or
//! unparseable is dropped to `None` so the scorer can stay total.

use crate::types::EngagementMetrics;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Video platforms (YouTube and similar).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VideoMetrics {
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub subscriber_count: Option<i64>,
    pub channel_verified: Option<bool>,
}

/// Discussion platforms (Reddit, Quora, forums).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiscussionMetrics {
    pub views: Option<i64>,
    pub upvotes: Option<i64>,
    /// Net score, may be negative.
    pub score: Option<i64>,
    pub num_comments: Option<i64>,
    pub author_karma: Option<i64>,
    /// Moderator-verified or "expert" flair.
    pub author_verified: Option<bool>,
}

/// Articles and blog posts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ArticleMetrics {
    pub page_views: Option<i64>,
    pub reactions: Option<i64>,
    pub comments: Option<i64>,
    /// Follower count of the author or publication.
    pub publication_followers: Option<i64>,
    /// Domain reputation expressed as an audience-size proxy.
    pub domain_reputation: Option<i64>,
    pub verified_publisher: Option<bool>,
}

/// Tagged platform metrics as produced by crawler adapters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PlatformMetrics {
    Video(VideoMetrics),
    Discussion(DiscussionMetrics),
    Article(ArticleMetrics),
}

impl PlatformMetrics {
    /// Normalize into the common metrics bag.
    pub fn normalize(&self) -> EngagementMetrics {
        match self {
            PlatformMetrics::Video(v) => EngagementMetrics {
                views: non_negative(v.view_count),
                score: None,
                likes: non_negative(v.like_count),
                comments: non_negative(v.comment_count),
                followers: non_negative(v.subscriber_count),
                verified: v.channel_verified,
            },
            PlatformMetrics::Discussion(d) => EngagementMetrics {
                views: non_negative(d.views),
                score: d.score,
                likes: non_negative(d.upvotes),
                comments: non_negative(d.num_comments),
                followers: non_negative(d.author_karma),
                verified: d.author_verified,
            },
            PlatformMetrics::Article(a) => EngagementMetrics {
                views: non_negative(a.page_views),
                score: None,
                likes: non_negative(a.reactions),
                comments: non_negative(a.comments),
                followers: non_negative(a.publication_followers)
                    .max(non_negative(a.domain_reputation)),
                verified: a.verified_publisher,
            },
        }
    }
}

impl From<PlatformMetrics> for EngagementMetrics {
    fn from(metrics: PlatformMetrics) -> Self {
        metrics.normalize()
    }
}

fn non_negative(value: Option<i64>) -> Option<u64> {
    value.and_then(|v| u64::try_from(v).ok())
}

/// Leniently parse a loosely-typed metrics object (crawler JSON).
///
/// Accepts integers, finite non-negative floats and numeric strings
/// ("12,345", " 42 "); everything else is treated as absent.
pub fn metrics_from_json(value: &Value) -> EngagementMetrics {
    let Some(obj) = value.as_object() else {
        return EngagementMetrics::default();
    };

    let count = |keys: &[&str]| keys.iter().find_map(|k| obj.get(*k).and_then(parse_count));

    EngagementMetrics {
        views: count(&["views", "view_count", "page_views"]),
        score: ["score", "net_score"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(parse_signed)),
        likes: count(&["likes", "like_count", "upvotes", "reactions"]),
        comments: count(&["comments", "comment_count", "num_comments"]),
        followers: count(&["followers", "subscriber_count", "subscribers", "karma"]),
        verified: ["verified", "is_verified", "channel_verified"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(parse_flag)),
    }
}

fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
            cleaned.parse::<u64>().ok()
        }
        _ => None,
    }
}

fn parse_signed(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().replace(',', "").parse::<i64>().ok(),
        _ => None,
    }
}

fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_u64().map(|v| v != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_video_normalization() {
        let metrics = PlatformMetrics::Video(VideoMetrics {
            view_count: Some(50_000),
            like_count: Some(2_500),
            comment_count: Some(300),
            subscriber_count: Some(250_000),
            channel_verified: Some(true),
        })
        .normalize();

        assert_eq!(metrics.views, Some(50_000));
        assert_eq!(metrics.likes, Some(2_500));
        assert_eq!(metrics.followers, Some(250_000));
        assert_eq!(metrics.verified, Some(true));
    }

    #[test]
    fn test_discussion_negative_counts_dropped() {
        let metrics = PlatformMetrics::Discussion(DiscussionMetrics {
            upvotes: Some(-3),
            score: Some(-3),
            num_comments: Some(12),
            author_karma: Some(-50),
            ..Default::default()
        })
        .normalize();

        assert_eq!(metrics.likes, None);
        assert_eq!(metrics.score, Some(-3));
        assert_eq!(metrics.comments, Some(12));
        assert_eq!(metrics.followers, None);
    }

    #[test]
    fn test_article_takes_larger_authority_proxy() {
        let metrics: EngagementMetrics = PlatformMetrics::Article(ArticleMetrics {
            publication_followers: Some(1_200),
            domain_reputation: Some(90_000),
            ..Default::default()
        })
        .into();
        assert_eq!(metrics.followers, Some(90_000));
    }

    #[test]
    fn test_lenient_json_parsing() {
        let metrics = metrics_from_json(&json!({
            "view_count": "1,250,000",
            "likes": 3200.0,
            "comments": "lots",
            "subscribers": -10,
            "is_verified": "yes",
            "score": "-4",
        }));

        assert_eq!(metrics.views, Some(1_250_000));
        assert_eq!(metrics.likes, Some(3_200));
        assert_eq!(metrics.comments, None);
        assert_eq!(metrics.followers, None);
        assert_eq!(metrics.verified, Some(true));
        assert_eq!(metrics.score, Some(-4));
    }

    #[test]
    fn test_non_object_json_is_empty() {
        assert!(metrics_from_json(&json!([1, 2, 3])).is_empty());
        assert!(metrics_from_json(&json!(null)).is_empty());
    }

    #[test]
    fn test_tagged_serde_shape() {
        let parsed: PlatformMetrics = serde_json::from_value(json!({
            "kind": "video",
            "view_count": 10,
            "like_count": 1,
            "comment_count": null,
            "subscriber_count": null,
            "channel_verified": false
        }))
        .unwrap();
        assert!(matches!(parsed, PlatformMetrics::Video(_)));
    }
}
