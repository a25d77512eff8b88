//! Line classification and deterministic secondary compression

use super::token_estimator::TokenEstimator;

const MODIFIERS: &[&str] = &[
    "pub ", "pub(crate) ", "public ", "private ", "fileprivate ", "internal ", "open ",
    "protected ", "static ", "final ", "async ", "export ", "default ", "abstract ", "override ",
    "@objc ", "unsafe ",
];

const DECLARATION_KEYWORDS: &[&str] = &[
    "class ", "struct ", "enum ", "trait ", "impl ", "impl<", "interface ", "protocol ",
    "extension ", "func ", "fn ", "def ", "function ", "function*", "mod ", "type ",
];

const COMMENT_PREFIXES: &[&str] = &["//", "#", "/*", "*", "--", "\"\"\"", "'''"];

/// Whether a line introduces a class, function, or similar declaration
pub fn is_declaration(line: &str) -> bool {
    let mut rest = line.trim_start();
    loop {
        match MODIFIERS.iter().find(|m| rest.starts_with(*m)) {
            Some(m) => rest = rest[m.len()..].trim_start(),
            None => break,
        }
    }
    DECLARATION_KEYWORDS.iter().any(|k| rest.starts_with(k))
}

pub fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    !trimmed.is_empty() && COMMENT_PREFIXES.iter().any(|p| trimmed.starts_with(p))
}

/// Ranking weight for an optional line
fn importance(line: &str, keywords: &[String]) -> usize {
    let lower = line.to_lowercase();
    let hits = keywords.iter().filter(|k| lower.contains(k.as_str())).count();
    let body = line.trim().chars().count().min(80);
    hits * 100 + body
}

/// Shrink content toward `target_tokens` by keeping whole lines.
///
/// The first and last lines, declarations, and comments are always kept.
/// Other lines are ranked by keyword hits and length and added greedily
/// while the running estimate stays within the target. Kept lines retain
/// their original order. The result is never estimated larger than the input.
pub fn secondary_compress(
    content: &str,
    target_tokens: usize,
    keywords: &[String],
    estimator: &dyn TokenEstimator,
) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return String::new();
    }

    let last = lines.len() - 1;
    let mut keep = vec![false; lines.len()];
    let mut used = 0usize;
    for (i, line) in lines.iter().enumerate() {
        if i == 0 || i == last || is_declaration(line) || is_comment(line) {
            keep[i] = true;
            used += estimator.estimate(line) + 1;
        }
    }

    let mut optional: Vec<(usize, usize)> = lines
        .iter()
        .enumerate()
        .filter(|(i, line)| !keep[*i] && !line.trim().is_empty())
        .map(|(i, line)| (i, importance(line, keywords)))
        .collect();
    optional.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    for (i, _) in optional {
        let cost = estimator.estimate(lines[i]) + 1;
        if used + cost <= target_tokens {
            keep[i] = true;
            used += cost;
        }
    }

    let compressed = lines
        .iter()
        .zip(keep.iter())
        .filter(|(_, k)| **k)
        .map(|(line, _)| *line)
        .collect::<Vec<_>>()
        .join("\n");

    if estimator.estimate(&compressed) > estimator.estimate(content) {
        content.to_string()
    } else {
        compressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::token_estimator::CharRatioEstimator;
    use proptest::prelude::*;

    #[test]
    fn test_declaration_detection() {
        assert!(is_declaration("pub fn run(&self) {"));
        assert!(is_declaration("    def login(self, user):"));
        assert!(is_declaration("export default class App {"));
        assert!(is_declaration("public final class AuthController: NSObject {"));
        assert!(is_declaration("async function fetchUser() {"));
        assert!(!is_declaration("let classes = 3;"));
        assert!(!is_declaration("return fn_ptr;"));
    }

    #[test]
    fn test_comment_detection() {
        assert!(is_comment("  // note"));
        assert!(is_comment("# heading"));
        assert!(is_comment(" * continued"));
        assert!(!is_comment("x = 1  # trailing"));
        assert!(!is_comment(""));
    }

    #[test]
    fn test_keeps_mandatory_lines_in_order() {
        let content = "header\nlet a = 1;\n// note\nfn login() {\nlet filler = 2;\nfooter";
        let out = secondary_compress(content, 1, &[], &CharRatioEstimator::default());
        assert_eq!(out, "header\n// note\nfn login() {\nfooter");
    }

    #[test]
    fn test_prefers_keyword_lines() {
        let content = "start\nlet unrelated_value = compute();\nlet login_attempts = 0;\nend";
        let keywords = vec!["login".to_string()];
        let estimator = CharRatioEstimator::default();
        let budget = estimator.estimate("start") + estimator.estimate("end") + 2
            + estimator.estimate("let login_attempts = 0;") + 1;

        let out = secondary_compress(content, budget, &keywords, &estimator);
        assert!(out.contains("login_attempts"));
        assert!(!out.contains("unrelated_value"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(secondary_compress("", 10, &[], &CharRatioEstimator::default()), "");
    }

    proptest! {
        #[test]
        fn never_grows(
            lines in proptest::collection::vec("[ a-z(){};/#=]{0,40}", 1..60),
            target in 0usize..400,
        ) {
            let content = lines.join("\n");
            let estimator = CharRatioEstimator::default();
            let out = secondary_compress(&content, target, &[], &estimator);
            prop_assert!(estimator.estimate(&out) <= estimator.estimate(&content));
        }
    }
}
