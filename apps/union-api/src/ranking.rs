//! Post listing sort orders.

use chrono::{DateTime, Duration, Utc};

use crate::error::ApiError;
use crate::models::post::Post;

/// Sort order for post listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostSort {
    /// Most recent first.
    New,
    /// Highest raw score (upvotes − downvotes) first.
    Top,
    /// Score decayed by age, so fresh well-scored posts surface above old
    /// high scorers.
    Trending,
}

impl PostSort {
    pub fn parse(value: Option<&str>) -> Result<Self, ApiError> {
        match value {
            None | Some("new") => Ok(PostSort::New),
            Some("top") => Ok(PostSort::Top),
            Some("trending") => Ok(PostSort::Trending),
            Some(other) => Err(ApiError::bad_request(format!("Unknown sort: {other}"))),
        }
    }
}

/// Parse a `since` window parameter into a cutoff timestamp.
pub fn window_cutoff(value: Option<&str>, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ApiError> {
    let span = match value {
        None | Some("all") => return Ok(None),
        Some("hour") => Duration::hours(1),
        Some("day") => Duration::days(1),
        Some("week") => Duration::weeks(1),
        Some("month") => Duration::days(30),
        Some("year") => Duration::days(365),
        Some(other) => {
            return Err(ApiError::bad_request(format!("Unknown time range: {other}")))
        }
    };
    Ok(Some(now - span))
}

/// Trending score: raw score divided by an age penalty.
///
/// The +2 floor keeps brand-new posts from dividing by ~zero.
pub fn trending_score(post: &Post, now: DateTime<Utc>) -> f64 {
    let score = (post.upvotes - post.downvotes) as f64;
    let age_hours = (now - post.created_at).num_seconds().max(0) as f64 / 3600.0;
    score / (age_hours + 2.0).powf(1.5)
}

/// Sort posts in place for the requested order. Ties fall back to recency.
pub fn sort_posts(posts: &mut [Post], sort: PostSort, now: DateTime<Utc>) {
    match sort {
        PostSort::New => posts.sort_by(|a, b| b.id.cmp(&a.id)),
        PostSort::Top => posts.sort_by(|a, b| {
            let sa = a.upvotes - a.downvotes;
            let sb = b.upvotes - b.downvotes;
            sb.cmp(&sa).then_with(|| b.id.cmp(&a.id))
        }),
        PostSort::Trending => posts.sort_by(|a, b| {
            let sa = trending_score(a, now);
            let sb = trending_score(b, now);
            sb.partial_cmp(&sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.id.cmp(&a.id))
        }),
    }
}
