//! Sidebar index: a read projection over the recording store.
//!
//! Holds the cached listing (refreshed after save/name/delete/rename) and
//! groups entries into recency buckets for display. The only coupling to
//! the session is the active recording id used for highlighting.

use std::sync::Arc;

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::backend::RecordingSummary;

/// Display bucket derived from a recording's creation time, day-aligned
/// against the local wall clock at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecencyBucket {
    Today,
    Yesterday,
    Last7Days,
    Last30Days,
    Older,
}

impl RecencyBucket {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Today => "Today",
            Self::Yesterday => "Yesterday",
            Self::Last7Days => "Last 7 Days",
            Self::Last30Days => "Last 30 Days",
            Self::Older => "Older",
        }
    }

    const ORDER: [RecencyBucket; 5] = [
        Self::Today,
        Self::Yesterday,
        Self::Last7Days,
        Self::Last30Days,
        Self::Older,
    ];
}

/// Bucket for `created_at` relative to `now`, by descending recency.
/// Boundaries are starts of local days: a timestamp exactly at today's
/// start-of-day is `Today`; one instant earlier is `Yesterday`.
pub fn bucket_for(created_at: DateTime<Local>, now: DateTime<Local>) -> RecencyBucket {
    let day_start = |days_back: u64| -> DateTime<Local> {
        let date = now
            .date_naive()
            .checked_sub_days(Days::new(days_back))
            .unwrap_or(now.date_naive());
        let naive = date.and_time(NaiveTime::MIN);
        // Resolve DST ambiguity toward the earlier instant.
        Local
            .from_local_datetime(&naive)
            .earliest()
            .unwrap_or(now)
    };

    if created_at >= day_start(0) {
        RecencyBucket::Today
    } else if created_at >= day_start(1) {
        RecencyBucket::Yesterday
    } else if created_at >= day_start(7) {
        RecencyBucket::Last7Days
    } else if created_at >= day_start(30) {
        RecencyBucket::Last30Days
    } else {
        RecencyBucket::Older
    }
}

/// One sidebar row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidebarEntry {
    pub id: String,
    pub name: String,
    pub duration_seconds: u64,
    pub created_at: DateTime<Utc>,
    pub active: bool,
}

/// Entries sharing one recency bucket, in source order.
#[derive(Debug, Clone, Serialize)]
pub struct SidebarGroup {
    pub label: &'static str,
    pub entries: Vec<SidebarEntry>,
}

/// Group recordings by bucket, preserving the repository's (reverse
/// chronological) order inside each bucket and emitting buckets in fixed
/// order, skipping empty ones.
pub fn group_recordings(
    recordings: &[RecordingSummary],
    active_id: Option<&str>,
    now: DateTime<Local>,
) -> Vec<SidebarGroup> {
    RecencyBucket::ORDER
        .iter()
        .filter_map(|bucket| {
            let entries: Vec<SidebarEntry> = recordings
                .iter()
                .filter(|r| bucket_for(r.created_at.with_timezone(&Local), now) == *bucket)
                .map(|r| SidebarEntry {
                    id: r.id.clone(),
                    name: r.name.clone(),
                    duration_seconds: r.duration,
                    created_at: r.created_at,
                    active: active_id == Some(r.id.as_str()),
                })
                .collect();
            if entries.is_empty() {
                None
            } else {
                Some(SidebarGroup {
                    label: bucket.label(),
                    entries,
                })
            }
        })
        .collect()
}

/// Shared cached listing.
#[derive(Clone, Default)]
pub struct SidebarHandle {
    inner: Arc<Mutex<Vec<RecordingSummary>>>,
}

impl SidebarHandle {
    pub async fn get(&self) -> Vec<RecordingSummary> {
        self.inner.lock().await.clone()
    }

    pub async fn set(&self, recordings: Vec<RecordingSummary>) {
        *self.inner.lock().await = recordings;
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.lock().await.iter().any(|r| r.id == id)
    }
}
