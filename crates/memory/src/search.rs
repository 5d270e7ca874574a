//! Keyword relevance scoring shared by the built-in memory stores.

use mindloop_core::{MemoryKind, MemoryRecord};

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Fraction of query tokens found in the record, plus a bonus when the whole
/// query appears verbatim. Tags count as content.
fn score(record: &MemoryRecord, query_lower: &str, query_tokens: &[String]) -> f32 {
    let content = record.content.to_lowercase();
    let mut haystack = tokens(&content);
    haystack.extend(record.tags.iter().map(|t| t.to_lowercase()));

    let matched = query_tokens.iter().filter(|t| haystack.contains(t)).count();
    let mut score = if query_tokens.is_empty() {
        0.0
    } else {
        matched as f32 / query_tokens.len() as f32
    };
    if content.contains(query_lower) {
        score += 1.0;
    }
    score
}

/// Filter a user's records and rank them.
///
/// An empty query returns the newest records. Otherwise only records with a
/// positive score are kept, best first, ties broken newest first.
pub(crate) fn rank(
    records: &[MemoryRecord],
    query: &str,
    user_id: &str,
    limit: usize,
    kind: Option<MemoryKind>,
) -> Vec<MemoryRecord> {
    // Reverse insertion order so equal timestamps still favour the latest write.
    let candidates = records
        .iter()
        .rev()
        .filter(|r| r.user_id == user_id)
        .filter(|r| kind.is_none_or(|k| r.kind == k));

    let query_lower = query.trim().to_lowercase();
    let mut results: Vec<MemoryRecord> = if query_lower.is_empty() {
        candidates.cloned().collect()
    } else {
        let query_tokens = tokens(&query_lower);
        candidates
            .filter_map(|r| {
                let s = score(r, &query_lower, &query_tokens);
                (s > 0.0).then(|| {
                    let mut r = r.clone();
                    r.score = Some(s);
                    r
                })
            })
            .collect()
    };

    results.sort_by(|a, b| {
        let by_score = b
            .score
            .unwrap_or(0.0)
            .partial_cmp(&a.score.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal);
        by_score.then(b.timestamp.cmp(&a.timestamp))
    });
    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use mindloop_core::NewMemory;

    fn record(content: &str, user: &str, kind: MemoryKind, age_secs: i64) -> MemoryRecord {
        let mut r = NewMemory::new(content, user, kind).into_record();
        r.timestamp = Utc::now() - Duration::seconds(age_secs);
        r
    }

    #[test]
    fn empty_query_returns_newest() {
        let records = vec![
            record("old", "u1", MemoryKind::Episodic, 100),
            record("new", "u1", MemoryKind::Episodic, 1),
            record("other user", "u2", MemoryKind::Episodic, 0),
        ];
        let results = rank(&records, "  ", "u1", 10, None);
        let contents: Vec<_> = results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["new", "old"]);
    }

    #[test]
    fn keyword_ranking_and_kind_filter() {
        let records = vec![
            record("Bob likes green tea", "u1", MemoryKind::Episodic, 10),
            record("Bob likes chess", "u1", MemoryKind::Cognitive, 5),
            record("the weather was cold", "u1", MemoryKind::Episodic, 1),
        ];
        let results = rank(&records, "green tea", "u1", 10, None);
        assert_eq!(results.len(), 1);
        assert!(results[0].score.unwrap() > 1.0);

        let results = rank(&records, "Bob", "u1", 10, Some(MemoryKind::Cognitive));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "Bob likes chess");
    }

    #[test]
    fn ties_prefer_newest() {
        let records = vec![
            record("cat one", "u1", MemoryKind::Episodic, 50),
            record("cat two", "u1", MemoryKind::Episodic, 5),
        ];
        let results = rank(&records, "cat", "u1", 1, None);
        assert_eq!(results[0].content, "cat two");
    }
}
