use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use parley_agent::ThreadView;
use serde::{Deserialize, Serialize};

/// Sidebar section, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Bucket {
    Today,
    Last7Days,
    Last30Days,
    Older,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::Today,
        Bucket::Last7Days,
        Bucket::Last30Days,
        Bucket::Older,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Bucket::Today => "Today",
            Bucket::Last7Days => "Last 7 days",
            Bucket::Last30Days => "Last 30 days",
            Bucket::Older => "Older",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadGroup {
    pub bucket: Bucket,
    pub label: String,
    pub threads: Vec<ThreadView>,
}

/// Start of the local day containing `now`
fn local_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let naive = now.date_naive().and_time(NaiveTime::MIN);
    match now.timezone().from_local_datetime(&naive).earliest() {
        Some(midnight) => midnight.with_timezone(&Utc),
        // no midnight that day (DST gap); the day started at the gap's end
        None => {
            let since_midnight = now.time().signed_duration_since(NaiveTime::MIN);
            now.with_timezone(&Utc) - since_midnight
        }
    }
}

pub fn bucket_for<Tz: TimeZone>(updated_at: DateTime<Utc>, now: &DateTime<Tz>) -> Bucket {
    let today_start = local_midnight(now);
    if updated_at >= today_start {
        Bucket::Today
    } else if updated_at >= today_start - Duration::days(7) {
        Bucket::Last7Days
    } else if updated_at >= today_start - Duration::days(30) {
        Bucket::Last30Days
    } else {
        Bucket::Older
    }
}

/// Partition threads into sidebar groups, keeping input order inside each
/// group and leaving out empty groups
pub fn group_threads<Tz: TimeZone>(threads: &[ThreadView], now: &DateTime<Tz>) -> Vec<ThreadGroup> {
    let mut groups: Vec<ThreadGroup> = Bucket::ALL
        .iter()
        .map(|bucket| ThreadGroup {
            bucket: *bucket,
            label: bucket.label().to_string(),
            threads: Vec::new(),
        })
        .collect();

    for thread in threads {
        let bucket = bucket_for(thread.updated_at, now);
        groups[bucket as usize].threads.push(thread.clone());
    }

    groups.retain(|g| !g.threads.is_empty());
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use parley_persist::ThreadStatus;

    fn thread(title: &str, updated_at: DateTime<Utc>) -> ThreadView {
        ThreadView {
            id: title.into(),
            uuid: format!("uuid-{title}"),
            title: title.into(),
            status: ThreadStatus::Active,
            created_at: updated_at,
            updated_at,
        }
    }

    fn now() -> DateTime<FixedOffset> {
        // 10:00 local, UTC+2
        DateTime::parse_from_rfc3339("2026-03-15T10:00:00+02:00").unwrap()
    }

    #[test]
    fn test_boundaries_anchor_at_local_midnight() {
        let now = now();
        let midnight = DateTime::parse_from_rfc3339("2026-03-15T00:00:00+02:00")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(bucket_for(midnight, &now), Bucket::Today);
        assert_eq!(bucket_for(midnight - Duration::seconds(1), &now), Bucket::Last7Days);
        assert_eq!(bucket_for(midnight - Duration::days(7), &now), Bucket::Last7Days);
        assert_eq!(
            bucket_for(midnight - Duration::days(7) - Duration::seconds(1), &now),
            Bucket::Last30Days
        );
        assert_eq!(bucket_for(midnight - Duration::days(30), &now), Bucket::Last30Days);
        assert_eq!(bucket_for(midnight - Duration::days(31), &now), Bucket::Older);
        // clock skew: future timestamps are still today
        assert_eq!(bucket_for(midnight + Duration::days(2), &now), Bucket::Today);
    }

    #[test]
    fn test_grouping_is_a_stable_partition() {
        let now = now();
        let base = now.with_timezone(&Utc);
        let threads = vec![
            thread("a", base - Duration::minutes(5)),
            thread("b", base - Duration::days(3)),
            thread("c", base - Duration::hours(1)),
            thread("d", base - Duration::days(400)),
        ];

        let groups = group_threads(&threads, &now);
        let layout: Vec<(Bucket, Vec<&str>)> = groups
            .iter()
            .map(|g| (g.bucket, g.threads.iter().map(|t| t.title.as_str()).collect()))
            .collect();
        assert_eq!(
            layout,
            vec![
                (Bucket::Today, vec!["a", "c"]),
                (Bucket::Last7Days, vec!["b"]),
                (Bucket::Older, vec!["d"]),
            ]
        );

        let total: usize = groups.iter().map(|g| g.threads.len()).sum();
        assert_eq!(total, threads.len());
        assert_eq!(groups, group_threads(&threads, &now));
    }

    #[test]
    fn test_empty_input_has_no_groups() {
        assert!(group_threads(&[], &now()).is_empty());
    }
}
