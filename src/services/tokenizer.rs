//! Search token extraction.
//!
//! Tokens are maximal runs of Unicode letters and digits, lowercased.
//! Everything else separates tokens and is dropped.

use crate::types::ApplicationRecord;
use std::collections::BTreeSet;

/// Splits `text` into lowercase alphanumeric tokens.
///
/// Never fails; empty, whitespace-only or punctuation-only input
/// yields an empty set.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    extend_tokens(&mut tokens, text);
    tokens
}

/// Tokens for an application: its name plus the stem of its executable.
pub fn tokenize_app(app: &ApplicationRecord) -> BTreeSet<String> {
    let mut tokens = tokenize(&app.name);
    if let Some(stem) = executable_stem(&app.executable) {
        extend_tokens(&mut tokens, stem);
    }
    tokens
}

fn extend_tokens(tokens: &mut BTreeSet<String>, text: &str) {
    tokens.extend(
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|run| !run.is_empty())
            .map(str::to_lowercase),
    );
}

/// File name of an executable reference without its extension.
///
/// Handles both `/` and `\` separators, since indexed paths may come
/// from another platform's conventions. A leading dot is part of the
/// name, not an extension.
pub fn executable_stem(reference: &str) -> Option<&str> {
    let trimmed = reference.trim().trim_end_matches(['/', '\\']);
    let file_name = trimmed
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())?;

    match file_name.rfind('.') {
        Some(0) | None => Some(file_name),
        Some(dot) => Some(&file_name[..dot]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppSource;

    fn sorted(tokens: BTreeSet<String>) -> Vec<String> {
        tokens.into_iter().collect()
    }

    #[test]
    fn test_splits_on_spaces() {
        assert_eq!(sorted(tokenize("Microsoft Word")), vec!["microsoft", "word"]);
    }

    #[test]
    fn test_splits_on_special_characters() {
        assert_eq!(
            sorted(tokenize("Visual-Studio_2022")),
            vec!["2022", "studio", "visual"]
        );
    }

    #[test]
    fn test_lowercases_and_dedups() {
        assert_eq!(sorted(tokenize("Test test TEST")), vec!["test"]);
        assert_eq!(sorted(tokenize("NOTEPAD")), vec!["notepad"]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
        assert!(tokenize("---").is_empty());
    }

    #[test]
    fn test_unicode_letters_are_kept() {
        assert_eq!(sorted(tokenize("Ünïcode Äpp")), vec!["äpp", "ünïcode"]);
        assert_eq!(sorted(tokenize("记事本 v2")), vec!["v2", "记事本"]);
    }

    #[test]
    fn test_executable_stem() {
        assert_eq!(executable_stem("C:\\Windows\\notepad.exe"), Some("notepad"));
        assert_eq!(executable_stem("/usr/bin/firefox"), Some("firefox"));
        assert_eq!(executable_stem("/opt/app/my.tool.sh"), Some("my.tool"));
        assert_eq!(executable_stem("/home/me/.local"), Some(".local"));
        assert_eq!(executable_stem("/usr/bin/"), Some("bin"));
        assert_eq!(executable_stem(""), None);
    }

    #[test]
    fn test_tokenize_app_merges_name_and_stem() {
        let app = ApplicationRecord::new("Visual Studio Code", "C:\\Apps\\VSCode\\Code.exe", AppSource::Shortcut);
        assert_eq!(sorted(tokenize_app(&app)), vec!["code", "studio", "visual"]);
    }

    #[test]
    fn test_extension_does_not_become_token() {
        let app = ApplicationRecord::new("Paint", "C:\\Windows\\mspaint.exe", AppSource::Registry);
        let tokens = tokenize_app(&app);
        assert!(tokens.contains("mspaint"));
        assert!(!tokens.contains("exe"));
    }
}
