use once_cell::sync::Lazy;
use regex::Regex;

pub static TASK_IDS: Lazy<IdSequence> = Lazy::new(|| IdSequence::new("TSK"));
pub static REQUEST_IDS: Lazy<IdSequence> = Lazy::new(|| IdSequence::new("REQ"));

/// Prefix plus zero-padded counter (`TSK001`, `TSK002`, ...). Ids that do not match the
/// pattern are ignored when computing the next value.
pub struct IdSequence {
    prefix: &'static str,
    pattern: Regex,
}

impl IdSequence {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            pattern: Regex::new(&format!(r"^{}(\d+)$", regex::escape(prefix))).expect("valid regex"),
        }
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    pub fn next<'a, I>(&self, existing: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let max = existing
            .into_iter()
            .filter_map(|id| self.pattern.captures(id))
            .filter_map(|captures| captures.get(1)?.as_str().parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        format!("{}{:03}", self.prefix, max.saturating_add(1))
    }
}

#[cfg(test)]
mod tests {
    use super::{REQUEST_IDS, TASK_IDS};

    #[test]
    fn empty_collection_starts_at_001() {
        assert_eq!(TASK_IDS.next(std::iter::empty()), "TSK001");
        assert_eq!(REQUEST_IDS.next(std::iter::empty()), "REQ001");
    }

    #[test]
    fn next_id_follows_maximum_suffix_not_count() {
        let existing = ["TSK001", "TSK007", "TSK003"];
        assert_eq!(TASK_IDS.next(existing), "TSK008");
    }

    #[test]
    fn foreign_ids_are_ignored() {
        let existing = ["TSK002", "ZEXIT01", "TSK-9", "tsk050", "REQ010"];
        assert_eq!(TASK_IDS.next(existing), "TSK003");
        assert_eq!(REQUEST_IDS.next(existing), "REQ011");
    }

    #[test]
    fn padding_grows_past_three_digits() {
        assert_eq!(TASK_IDS.next(["TSK999"]), "TSK1000");
    }

    #[test]
    fn generated_id_is_never_an_existing_one() {
        let mut ids: Vec<String> = Vec::new();
        for _ in 0..25 {
            let next = TASK_IDS.next(ids.iter().map(String::as_str));
            assert!(!ids.contains(&next));
            ids.push(next);
        }
        assert_eq!(ids.last().map(String::as_str), Some("TSK025"));
    }
}
