//! Task tokenization and keyword concepts

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "into", "onto", "are", "was", "were",
    "will", "should", "would", "could", "can", "not", "but", "all", "any", "our", "your", "their",
    "its", "has", "have", "had", "when", "where", "which", "what", "who", "why", "how", "then",
    "than", "there", "here", "some", "more", "most", "also", "just", "like", "make", "need",
    "needs", "please", "via", "per", "use", "using", "about", "after", "before", "over", "under",
    "out", "get", "set", "new",
];

/// Short words kept despite the length cutoff
const SHORT_TERMS: &[&str] = &["db"];

/// Split a task into lowercase keywords.
///
/// Tokens are alphanumeric runs longer than two characters (plus a few
/// well-known abbreviations), stop words are dropped, and duplicates are
/// removed keeping first occurrence.
pub fn tokenize(task: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for raw in task.split(|c: char| !c.is_alphanumeric() && c != '_') {
        let token = raw.trim_matches('_').to_lowercase();
        let too_short = token.chars().count() <= 2 && !SHORT_TERMS.contains(&token.as_str());
        if too_short || STOP_WORDS.contains(&token.as_str()) {
            continue;
        }
        if !keywords.contains(&token) {
            keywords.push(token);
        }
    }
    keywords
}

/// A group of task words that point at the same area of a codebase
#[derive(Debug, Clone, Copy)]
pub struct Concept {
    pub name: &'static str,
    /// Words in a task that trigger the concept
    pub triggers: &'static [&'static str],
    /// Path fragments that belong to the concept
    pub markers: &'static [&'static str],
}

pub const CONCEPTS: &[Concept] = &[
    Concept {
        name: "auth",
        triggers: &[
            "login", "logout", "signin", "signup", "auth", "authentication", "authorization",
            "password", "session", "token", "credential", "credentials", "oauth", "permission",
        ],
        markers: &["auth", "login", "session", "account", "credential", "oauth", "signin", "permission"],
    },
    Concept {
        name: "data",
        triggers: &[
            "database", "db", "model", "models", "schema", "query", "migration", "table", "orm",
            "persistence", "repository",
        ],
        markers: &["model", "schema", "migration", "repository", "dao", "entity", "db", "store"],
    },
    Concept {
        name: "ui",
        triggers: &[
            "view", "screen", "component", "layout", "button", "style", "css", "page", "render",
            "frontend", "display",
        ],
        markers: &["view", "component", "screen", "layout", "page", "style", "widget", "template"],
    },
    Concept {
        name: "network",
        triggers: &[
            "api", "request", "http", "fetch", "endpoint", "client", "server", "route", "routing",
            "network", "rest", "graphql",
        ],
        markers: &["api", "client", "route", "endpoint", "http", "network", "service", "controller"],
    },
    Concept {
        name: "errors",
        triggers: &["error", "errors", "exception", "crash", "panic", "failure", "logging"],
        markers: &["error", "exception", "logger", "logging", "fault"],
    },
    Concept {
        name: "payments",
        triggers: &["payment", "payments", "billing", "invoice", "checkout", "subscription", "stripe"],
        markers: &["payment", "billing", "invoice", "checkout", "subscription", "cart"],
    },
];

/// Concepts triggered by any of the given keywords, in table order
pub fn triggered_concepts(keywords: &[String]) -> Vec<&'static Concept> {
    CONCEPTS
        .iter()
        .filter(|c| keywords.iter().any(|k| c.triggers.contains(&k.as_str())))
        .collect()
}

/// Whether the task mentions any word from a vocabulary
pub fn mentions_any(keywords: &[String], vocab: &[&str]) -> bool {
    keywords.iter().any(|k| vocab.contains(&k.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_short_and_stop_words() {
        let keywords = tokenize("Fix the login bug in UI for the API");
        assert_eq!(keywords, vec!["fix", "login", "bug", "api"]);
    }

    #[test]
    fn test_tokenize_dedups() {
        let keywords = tokenize("cache cache CACHE invalidation");
        assert_eq!(keywords, vec!["cache", "invalidation"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("a an of").is_empty());
    }

    #[test]
    fn test_login_triggers_auth_concept() {
        let keywords = tokenize("fix login bug");
        let concepts = triggered_concepts(&keywords);
        assert_eq!(concepts.len(), 1);
        assert_eq!(concepts[0].name, "auth");
    }

    #[test]
    fn test_short_db_keeps_data_concept() {
        let keywords = tokenize("speed up the db layer");
        assert_eq!(keywords, vec!["speed", "db", "layer"]);
        let concepts = triggered_concepts(&keywords);
        assert_eq!(concepts.len(), 1);
        assert_eq!(concepts[0].name, "data");
    }
}
