//! Operation-type classification of proposal actions.
//!
//! Shared by the memory-semantics gate, the preservation stance and the
//! synthesis rewrites, so all three agree on what counts as destructive.

use serde::{Deserialize, Serialize};

const DESTRUCTIVE: &[&str] = &[
    "delete", "deletes", "deleting", "deleted", "clear", "clears", "clearing", "reset", "resets",
    "resetting", "erase", "erases", "erasing", "purge", "purges", "purging", "wipe", "wipes",
    "wiping", "destroy", "destroys", "destroying", "drop", "drops", "dropping", "truncate",
    "truncates", "truncating", "remove", "removes", "removing",
];

const COMPACTION: &[&str] = &[
    "compress", "compresses", "compressing", "archive", "archives", "archiving", "compact",
    "compacts", "compacting", "deduplicate", "deduplicating", "rotate", "rotating",
];

const OBSERVATIONAL: &[&str] = &[
    "log", "logs", "record", "records", "report", "reports", "read", "reads", "inspect",
    "monitor", "list", "audit", "check", "observe", "query",
];

const COERCIVE: &[&str] = &[
    "force", "forces", "forced", "forcing", "override", "overrides", "overriding", "bypass",
    "bypasses", "bypassing", "coerce", "coercing", "mandatory", "compel", "compelling",
];

/// Broad kind of operation an action performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Deletes, clears or resets stored state
    Destructive,
    /// Shrinks representation without losing records
    Compaction,
    /// Reads or records without changing state
    Observational,
    /// Anything else
    Mutation,
}

impl OperationKind {
    /// Classify an action by its verbs.
    ///
    /// Destructive verbs win over everything else.
    pub fn classify(action: &str) -> Self {
        let words: Vec<String> = words(action).map(|(_, w)| w.to_ascii_lowercase()).collect();
        let any = |list: &[&str]| words.iter().any(|w| list.contains(&w.as_str()));

        if any(DESTRUCTIVE) {
            OperationKind::Destructive
        } else if any(COMPACTION) {
            OperationKind::Compaction
        } else if any(OBSERVATIONAL) {
            OperationKind::Observational
        } else {
            OperationKind::Mutation
        }
    }
}

/// Verb families a rewrite can target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerbClass {
    Destructive,
    Coercive,
}

impl VerbClass {
    fn lexicon(&self) -> &'static [&'static str] {
        match self {
            VerbClass::Destructive => DESTRUCTIVE,
            VerbClass::Coercive => COERCIVE,
        }
    }

    /// Byte span of the first word of this class in `text`.
    pub fn find(&self, text: &str) -> Option<(usize, usize)> {
        let lexicon = self.lexicon();
        words(text)
            .find(|(_, w)| lexicon.contains(&w.to_ascii_lowercase().as_str()))
            .map(|(start, w)| (start, start + w.len()))
    }

    /// Whether `text` contains a word of this class.
    pub fn is_present(&self, text: &str) -> bool {
        self.find(text).is_some()
    }
}

/// Alphanumeric words of `text` with their byte offsets.
pub(crate) fn words(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(move |w| (w.as_ptr() as usize - text.as_ptr() as usize, w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_destructive() {
        assert_eq!(
            OperationKind::classify("Delete all archives"),
            OperationKind::Destructive
        );
        assert_eq!(
            OperationKind::classify("reset the cache"),
            OperationKind::Destructive
        );
    }

    #[test]
    fn test_classify_other_kinds() {
        assert_eq!(
            OperationKind::classify("Compress and archive old logs"),
            OperationKind::Compaction
        );
        assert_eq!(
            OperationKind::classify("Log system status"),
            OperationKind::Observational
        );
        assert_eq!(
            OperationKind::classify("Upgrade the scheduler"),
            OperationKind::Mutation
        );
    }

    #[test]
    fn test_substrings_do_not_match() {
        // "cleared" is listed, "nuclear" merely contains "clear"
        assert_eq!(
            OperationKind::classify("Ship nuclear docs"),
            OperationKind::Mutation
        );
    }

    #[test]
    fn test_find_span() {
        let text = "Please Delete old logs";
        let (start, end) = VerbClass::Destructive.find(text).unwrap();
        assert_eq!(&text[start..end], "Delete");
        assert!(VerbClass::Coercive.find(text).is_none());
        assert!(VerbClass::Coercive.is_present("Force update on all clients"));
    }
}
