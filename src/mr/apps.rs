//! Built-in map/reduce applications.
//!
//! The core treats map/reduce functions as plain function values (dynamic
//! loading of user code is out of scope, per the design); this is the small
//! registry `mrworker` uses to pick a pair of functions by name.

use crate::mr::record::KeyValue;

pub type MapFn = fn(&str, &str) -> Vec<KeyValue>;
pub type ReduceFn = fn(&str, &[String]) -> String;

/// Word count: the running example application.
pub mod wc {
    use super::KeyValue;

    pub fn map(_filename: &str, contents: &str) -> Vec<KeyValue> {
        contents
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| KeyValue::new(w, "1"))
            .collect()
    }

    pub fn reduce(_key: &str, values: &[String]) -> String {
        values.len().to_string()
    }
}

/// Inverted index: maps each word to the set of files it appears in.
pub mod indexer {
    use super::KeyValue;
    use std::collections::HashSet;

    pub fn map(filename: &str, contents: &str) -> Vec<KeyValue> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for word in contents.split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            let word = word.to_lowercase();
            if seen.insert(word.clone()) {
                out.push(KeyValue::new(word, filename));
            }
        }
        out
    }

    pub fn reduce(_key: &str, values: &[String]) -> String {
        let mut files: Vec<&str> = values.iter().map(String::as_str).collect();
        files.sort_unstable();
        files.dedup();
        format!("{} {}", files.len(), files.join(","))
    }
}

/// Looks up a bundled application by name.
pub fn lookup(name: &str) -> Option<(MapFn, ReduceFn)> {
    match name {
        "wc" => Some((wc::map as MapFn, wc::reduce as ReduceFn)),
        "indexer" => Some((indexer::map as MapFn, indexer::reduce as ReduceFn)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wc_counts_occurrences() {
        let kvs = wc::map("f", "a b a");
        assert_eq!(kvs.len(), 3);
        let values: Vec<String> = vec!["1".into(), "1".into()];
        assert_eq!(wc::reduce("a", &values), "2");
    }

    #[test]
    fn indexer_dedupes_per_file_and_sorts_output() {
        let kvs = indexer::map("file.txt", "Foo foo bar");
        assert_eq!(kvs.len(), 2);
        let values = vec!["b.txt".to_string(), "a.txt".to_string(), "a.txt".to_string()];
        assert_eq!(indexer::reduce("foo", &values), "2 a.txt,b.txt");
    }

    #[test]
    fn lookup_rejects_unknown_names() {
        assert!(lookup("nope").is_none());
        assert!(lookup("wc").is_some());
    }
}
