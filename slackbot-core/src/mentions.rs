// ABOUTME: Parser and rewriter for inline `<C123>` / `<U42|alice>` entity references
// ABOUTME: Rewrites references to `#channel` / `@user`, leaving unresolvable ones untouched

use metrics::counter;
use std::collections::HashMap;

use crate::error::BotError;
use crate::identity::IdentityCache;
use crate::metrics::MENTIONS_UNRESOLVED_TOTAL;
use crate::traits::Directory;

/// What a reference points at, decided by the first character of its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MentionKind {
    Channel,
    User,
    Unrecognized,
}

impl MentionKind {
    fn of(id: &str) -> Self {
        match id.chars().next() {
            Some('C') => Self::Channel,
            Some('U') => Self::User,
            _ => Self::Unrecognized,
        }
    }

    fn sigil(self) -> Option<char> {
        match self {
            Self::Channel => Some('#'),
            Self::User => Some('@'),
            Self::Unrecognized => None,
        }
    }
}

/// One `<...>` reference found in message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionRef<'a> {
    /// The full literal, delimiters included (e.g., `<U42|alice>`)
    pub literal: &'a str,
    /// Byte offset of the opening `<`
    pub start: usize,
    /// Byte offset just past the closing `>`
    pub end: usize,
    /// Technical id, discriminator included (e.g., `U42`)
    pub id: &'a str,
    /// Inline display name following the first `|`, if any
    pub display: Option<&'a str>,
    pub kind: MentionKind,
}

/// Find every reference in `text`, left to right.
///
/// A reference runs from a `<` to the first `>` after it. If a newline comes
/// first, that `<` opens nothing and scanning resumes right after it. Nested
/// or unbalanced brackets get no special treatment.
pub fn parse_references(text: &str) -> Vec<MentionRef<'_>> {
    let mut refs = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find('<') {
        let start = cursor + offset;
        let body_start = start + 1;
        let rest = &text[body_start..];

        match rest.find(['>', '\n']) {
            Some(close) if rest.as_bytes()[close] == b'>' => {
                let inner = &rest[..close];
                let end = body_start + close + 1;
                let (id, display) = match inner.split_once('|') {
                    Some((id, display)) => (id, Some(display)),
                    None => (inner, None),
                };
                refs.push(MentionRef {
                    literal: &text[start..end],
                    start,
                    end,
                    id,
                    display,
                    kind: MentionKind::of(id),
                });
                cursor = end;
            }
            _ => cursor = body_start,
        }
    }

    refs
}

/// Rewrite every reference in `text` into display form.
///
/// Inline display names are used verbatim without a lookup. Bare ids are
/// resolved through the cache; a failed resolution leaves that one reference
/// as it was and never affects the others. Repeated literals are resolved
/// once and substituted identically.
pub async fn rewrite_mentions<D: Directory>(text: &str, cache: &mut IdentityCache<D>) -> String {
    let refs = parse_references(text);
    if refs.is_empty() {
        return text.to_string();
    }

    let mut substitutions: HashMap<&str, Option<String>> = HashMap::new();
    for mention in &refs {
        if substitutions.contains_key(mention.literal) {
            continue;
        }
        let replacement = display_form(mention, cache).await;
        substitutions.insert(mention.literal, replacement);
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for mention in &refs {
        out.push_str(&text[cursor..mention.start]);
        match substitutions.get(mention.literal) {
            Some(Some(replacement)) => out.push_str(replacement),
            _ => out.push_str(mention.literal),
        }
        cursor = mention.end;
    }
    out.push_str(&text[cursor..]);
    out
}

async fn display_form<D: Directory>(
    mention: &MentionRef<'_>,
    cache: &mut IdentityCache<D>,
) -> Option<String> {
    let sigil = mention.kind.sigil()?;

    if let Some(display) = mention.display {
        return Some(format!("{}{}", sigil, display));
    }

    let resolved = match mention.kind {
        MentionKind::Channel => cache.resolve_channel(mention.id).await,
        MentionKind::User => cache.resolve_user(mention.id).await.map(|user| user.name),
        MentionKind::Unrecognized => return None,
    };

    match resolved {
        Ok(name) => Some(format!("{}{}", sigil, name)),
        Err(e) => {
            let err = BotError::mention(mention.literal, e);
            counter!(MENTIONS_UNRESOLVED_TOTAL).increment(1);
            tracing::warn!(error = %err, "Leaving mention unrewritten");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDirectory;

    fn cache(dir: MockDirectory) -> IdentityCache<MockDirectory> {
        IdentityCache::new(dir)
    }

    // =========================================================================
    // Parser
    // =========================================================================

    #[test]
    fn test_parse_bare_and_named_references() {
        let refs = parse_references("hi <U42> in <C123|general>!");
        assert_eq!(refs.len(), 2);

        assert_eq!(refs[0].literal, "<U42>");
        assert_eq!(refs[0].id, "U42");
        assert_eq!(refs[0].display, None);
        assert_eq!(refs[0].kind, MentionKind::User);
        assert_eq!((refs[0].start, refs[0].end), (3, 8));

        assert_eq!(refs[1].literal, "<C123|general>");
        assert_eq!(refs[1].id, "C123");
        assert_eq!(refs[1].display, Some("general"));
        assert_eq!(refs[1].kind, MentionKind::Channel);
    }

    #[test]
    fn test_parse_splits_on_first_pipe_only() {
        let refs = parse_references("<U1|a|b>");
        assert_eq!(refs[0].id, "U1");
        assert_eq!(refs[0].display, Some("a|b"));
    }

    #[test]
    fn test_parse_unrecognized_discriminators() {
        let refs = parse_references("<!here> <https://example.com> <>");
        let kinds: Vec<_> = refs.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![MentionKind::Unrecognized; 3]);
    }

    #[test]
    fn test_parse_is_non_greedy() {
        let refs = parse_references("<U1> and <U2>");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].literal, "<U1>");
        assert_eq!(refs[1].literal, "<U2>");
    }

    #[test]
    fn test_parse_reference_does_not_span_lines() {
        let refs = parse_references("a < b\nsee <C1>");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].literal, "<C1>");
    }

    #[test]
    fn test_parse_unclosed_bracket() {
        assert!(parse_references("x <U1 never closed").is_empty());
        assert!(parse_references("no refs at all").is_empty());
    }

    #[test]
    fn test_parse_handles_multibyte_text() {
        let refs = parse_references("héllo <C1|ñandú> ✓");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].display, Some("ñandú"));
    }

    // =========================================================================
    // Rewriter
    // =========================================================================

    #[tokio::test]
    async fn test_inline_channel_name_needs_no_lookup() {
        let mut cache = cache(MockDirectory::new());
        let out = rewrite_mentions("<C123|general>", &mut cache).await;
        assert_eq!(out, "#general");
        assert_eq!(cache.directory().total_calls(), 0);
    }

    #[tokio::test]
    async fn test_inline_user_name_needs_no_lookup() {
        let mut cache = cache(MockDirectory::new());
        let out = rewrite_mentions("<U42|alice>", &mut cache).await;
        assert_eq!(out, "@alice");
        assert_eq!(cache.directory().total_calls(), 0);
    }

    #[tokio::test]
    async fn test_bare_channel_is_resolved() {
        let mut cache = cache(MockDirectory::new().with_channel("C123", "general"));
        let out = rewrite_mentions("<C123>", &mut cache).await;
        assert_eq!(out, "#general");
        assert_eq!(cache.directory().channel_calls("C123"), 1);
    }

    #[tokio::test]
    async fn test_failed_user_stays_literal_and_others_still_rewrite() {
        let mut cache = cache(MockDirectory::new().with_channel("C1", "random"));
        let out = rewrite_mentions("ping <U42> about <C1> and <U7|bob>", &mut cache).await;
        assert_eq!(out, "ping <U42> about #random and @bob");
    }

    #[tokio::test]
    async fn test_repeated_reference_substituted_everywhere_with_one_lookup() {
        let mut cache = cache(MockDirectory::new().with_user("U42", "alice"));
        let out = rewrite_mentions("<U42> <U42> <U42>", &mut cache).await;
        assert_eq!(out, "@alice @alice @alice");
        assert_eq!(cache.directory().user_calls("U42"), 1);
    }

    #[tokio::test]
    async fn test_unrecognized_reference_left_alone() {
        let mut cache = cache(MockDirectory::new());
        let text = "see <https://example.com|the docs> <!channel>";
        let out = rewrite_mentions(text, &mut cache).await;
        assert_eq!(out, text);
        assert_eq!(cache.directory().total_calls(), 0);
    }

    #[tokio::test]
    async fn test_bot_user_mention_has_empty_name() {
        let mut cache = cache(MockDirectory::new().with_bot("U99", "deploybot"));
        let out = rewrite_mentions("thanks <U99>", &mut cache).await;
        assert_eq!(out, "thanks @");
    }

    #[tokio::test]
    async fn test_rewrite_is_idempotent_once_resolved() {
        let mut cache = cache(
            MockDirectory::new()
                .with_channel("C1", "general")
                .with_user("U1", "alice"),
        );
        let once = rewrite_mentions("<U1> posted in <C1|general> and <C1>", &mut cache).await;
        let twice = rewrite_mentions(&once, &mut cache).await;
        assert_eq!(once, "@alice posted in #general and #general");
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_text_without_references_is_unchanged() {
        let mut cache = cache(MockDirectory::new());
        let out = rewrite_mentions("plain text, 1 < 2", &mut cache).await;
        assert_eq!(out, "plain text, 1 < 2");
    }

    #[tokio::test]
    async fn test_lookup_populates_cache_for_later_messages() {
        let mut cache = cache(MockDirectory::new().with_channel("C5", "ops"));
        rewrite_mentions("<C5>", &mut cache).await;
        assert_eq!(cache.cached_channel("C5"), Some("ops"));
        rewrite_mentions("again <C5>", &mut cache).await;
        assert_eq!(cache.directory().channel_calls("C5"), 1);
    }
}
