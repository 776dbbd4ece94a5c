use crate::{ComicId, EntryUniverse};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Token -> ids of the entries containing it.
///
/// Posting lists are sorted and hold each id once, so rebuilding from the
/// same universe always yields an equal index.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvertedIndex {
    postings: HashMap<String, Vec<ComicId>>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Full rebuild from a universe. Sentinel entries are skipped.
    pub fn build(entries: &EntryUniverse) -> Self {
        let mut postings: HashMap<String, Vec<ComicId>> = HashMap::new();
        for (&id, entry) in entries {
            if entry.is_sentinel() { continue; }
            let mut seen_in_entry: HashSet<&str> = HashSet::with_capacity(entry.keywords.len());
            for token in &entry.keywords {
                if seen_in_entry.insert(token.as_str()) {
                    postings.entry(token.clone()).or_default().push(id);
                }
            }
        }
        for ids in postings.values_mut() {
            ids.sort_unstable();
        }
        Self { postings }
    }

    pub fn postings(&self, token: &str) -> &[ComicId] {
        self.postings.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids containing at least one of the tokens, ascending. Unknown tokens match nothing.
    pub fn find<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<ComicId> {
        let mut hits = BTreeSet::new();
        for token in tokens {
            hits.extend(self.postings(token.as_ref()).iter().copied());
        }
        hits.into_iter().collect()
    }

    pub fn num_terms(&self) -> usize { self.postings.len() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Entry;

    fn entry(keywords: &[&str]) -> Entry {
        Entry::new("https://imgs.example/c.png", keywords.iter().map(|s| s.to_string()).collect())
    }

    fn scenario_a() -> EntryUniverse {
        EntryUniverse::from([(1, entry(&["a", "b"])), (2, entry(&["b", "c"]))])
    }

    #[test]
    fn union_search_over_tokens() {
        let index = InvertedIndex::build(&scenario_a());
        assert_eq!(index.find(&["b"]), vec![1, 2]);
        assert_eq!(index.find(&["a", "c"]), vec![1, 2]);
        assert!(index.find(&["z"]).is_empty());
        assert!(index.find::<&str>(&[]).is_empty());
    }

    #[test]
    fn rebuild_is_idempotent() {
        let universe = scenario_a();
        assert_eq!(InvertedIndex::build(&universe), InvertedIndex::build(&universe));
    }

    #[test]
    fn repeated_token_counts_once_per_entry() {
        let universe = EntryUniverse::from([(7, entry(&["a", "a", "b"]))]);
        let index = InvertedIndex::build(&universe);
        assert_eq!(index.postings("a"), &[7]);
        assert_eq!(index.postings("b"), &[7]);
    }

    #[test]
    fn membership_matches_keywords() {
        let universe = EntryUniverse::from([
            (1, entry(&["x", "y"])),
            (2, entry(&["y", "z", "y"])),
            (3, entry(&[])),
        ]);
        let index = InvertedIndex::build(&universe);
        for token in ["x", "y", "z", "w"] {
            for (id, e) in &universe {
                let has = e.keywords.iter().any(|k| k == token);
                assert_eq!(has, index.postings(token).contains(id), "token {token} id {id}");
            }
        }
        assert_eq!(index.num_terms(), 3);
    }

    #[test]
    fn sentinels_are_not_indexed() {
        let mut universe = scenario_a();
        universe.insert(3, Entry { url: String::new(), keywords: vec!["a".into()] });
        let index = InvertedIndex::build(&universe);
        assert_eq!(index.postings("a"), &[1]);
    }

    #[test]
    fn union_equals_posting_union() {
        let index = InvertedIndex::build(&scenario_a());
        let mut expected: Vec<ComicId> = index.postings("a").to_vec();
        expected.extend_from_slice(index.postings("c"));
        expected.sort_unstable();
        expected.dedup();
        assert_eq!(index.find(&["a", "c"]), expected);
    }
}
