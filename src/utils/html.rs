//! HTML sanitizing.

use std::sync::LazyLock;

use regex::Regex;

struct Patterns {
    script_blocks: Regex,
    style_blocks: Regex,
    comments: Regex,
    stray_tags: Regex,
    unterminated_comment: Regex,
    whitespace: Regex,
    between_tags: Regex,
}

static PATTERNS: LazyLock<Option<Patterns>> = LazyLock::new(|| {
    Some(Patterns {
        script_blocks: Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").ok()?,
        style_blocks: Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").ok()?,
        comments: Regex::new(r"(?s)<!--.*?-->").ok()?,
        stray_tags: Regex::new(r"(?i)<(?:script|style)\b[^>]*>?").ok()?,
        unterminated_comment: Regex::new(r"(?s)<!--.*$").ok()?,
        whitespace: Regex::new(r"\s+").ok()?,
        between_tags: Regex::new(r">\s+<").ok()?,
    })
});

/// Strip `<script>`/`<style>` blocks and comments, then squeeze whitespace.
///
/// Removal repeats until nothing changes, so fragments that reassemble into
/// a tag after one pass (`<scr<script></script>ipt>`) are caught too.
/// Unclosed script/style openers and comments are dropped as well.
pub fn clean_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let Some(p) = PATTERNS.as_ref() else {
        return html.trim().to_string();
    };

    let mut current = html.to_string();
    loop {
        let mut next = p.script_blocks.replace_all(&current, "").into_owned();
        next = p.style_blocks.replace_all(&next, "").into_owned();
        next = p.comments.replace_all(&next, "").into_owned();
        if next != current {
            current = next;
            continue;
        }

        // Only once no complete block is left can an opener be unclosed.
        next = p.stray_tags.replace_all(&next, "").into_owned();
        next = p.unterminated_comment.replace_all(&next, "").into_owned();
        if next == current {
            break;
        }
        current = next;
    }

    let collapsed = p.whitespace.replace_all(&current, " ");
    let tight = p.between_tags.replace_all(&collapsed, "><");
    tight.trim().to_string()
}
