//! Card extraction from listing pages.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use super::prompts::{build_analysis_prompt, build_extraction_prompt, default_card_instruction};
use super::{CompletionBackend, LlmError};
use crate::models::{ExtractedCard, SelectorConfig, Source, SourceKind};
use crate::utils::{clean_html, truncate_chars};

/// Default character budget for sanitized HTML.
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 100_000;

/// Per-source inputs to an extraction call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractionContext<'a> {
    /// Source-specific instruction. A default is generated when absent.
    pub prompt: Option<&'a str>,
    /// Fallback group for cards the model does not attribute.
    pub group_name: Option<&'a str>,
    pub category: Option<&'a str>,
}

impl<'a> ExtractionContext<'a> {
    pub fn for_source(source: &'a Source) -> Self {
        let prompt = match &source.kind {
            SourceKind::Llm(config) => config.prompt.as_deref().filter(|p| !p.trim().is_empty()),
            _ => None,
        };
        Self {
            prompt,
            group_name: source.group_name.as_deref(),
            category: source.category.as_deref(),
        }
    }

    fn instruction(&self) -> String {
        match self.prompt {
            Some(prompt) => prompt.to_string(),
            None => default_card_instruction(self.group_name, self.category),
        }
    }
}

/// Whether a page looks like a card listing, with suggested selectors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAnalysis {
    pub is_card_listing: bool,
    pub card_selector: Option<String>,
    pub name_selector: Option<String>,
    pub image_selector: Option<String>,
    pub next_page_selector: Option<String>,
    pub notes: Option<String>,
}

impl PageAnalysis {
    /// Selector configuration seeded from the suggestions.
    pub fn to_selector_config(&self) -> SelectorConfig {
        SelectorConfig {
            card_selector: self.card_selector.clone(),
            name_selector: self.name_selector.clone(),
            image_selector: self.image_selector.clone(),
            next_page_selector: self.next_page_selector.clone(),
            ..Default::default()
        }
    }
}

/// Sends sanitized page HTML to a completion backend and parses the reply.
#[derive(Clone)]
pub struct CardExtractor {
    backend: Arc<dyn CompletionBackend>,
    max_content_chars: usize,
}

impl CardExtractor {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }

    pub fn with_max_content_chars(mut self, max_content_chars: usize) -> Self {
        self.max_content_chars = max_content_chars;
        self
    }

    /// Sanitize and truncate page HTML to the character budget.
    pub fn prepare_content(&self, html: &str) -> String {
        let cleaned = clean_html(html);
        let original = cleaned.chars().count();
        if original > self.max_content_chars {
            debug!(
                "Truncating page content from {} to {} chars",
                original, self.max_content_chars
            );
        }
        truncate_chars(&cleaned, self.max_content_chars)
    }

    /// Extract cards from a listing page.
    ///
    /// Completion failures are returned as errors. An unusable reply is not
    /// an error: it yields an empty list.
    pub async fn extract_cards(
        &self,
        html: &str,
        page_url: &str,
        context: ExtractionContext<'_>,
    ) -> Result<Vec<ExtractedCard>, LlmError> {
        let content = self.prepare_content(html);
        let prompt = build_extraction_prompt(&context.instruction(), page_url, &content);

        let reply = self.backend.complete(&prompt).await?;
        let mut cards = parse_cards(&reply, page_url);

        if let Some(group) = context.group_name {
            for card in cards.iter_mut().filter(|c| c.group_name.is_none()) {
                card.group_name = Some(group.to_string());
            }
        }

        debug!("Extracted {} cards from {}", cards.len(), page_url);
        Ok(cards)
    }

    /// Classify a page. An unusable reply yields a non-listing result.
    pub async fn analyze_page(&self, html: &str, page_url: &str) -> Result<PageAnalysis, LlmError> {
        let content = self.prepare_content(html);
        let prompt = build_analysis_prompt(page_url, &content);
        let reply = self.backend.complete(&prompt).await?;
        Ok(parse_page_analysis(&reply))
    }
}

/// The substring from the first `[` to the last `]`, if any.
pub fn find_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

fn find_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a model reply into validated cards.
///
/// Entries without a non-empty string `name` and `imageUrl` are dropped, as
/// are entries whose image URL cannot be made absolute against `page_url`.
/// Optional fields are kept only when they are non-empty strings.
pub fn parse_cards(reply: &str, page_url: &str) -> Vec<ExtractedCard> {
    let Some(array) = find_json_array(reply) else {
        warn!("Model reply for {} contained no JSON array", page_url);
        return Vec::new();
    };

    let entries: Vec<Value> = match serde_json::from_str(array) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to parse model reply for {}: {}", page_url, e);
            return Vec::new();
        }
    };

    let base = Url::parse(page_url).ok();
    let total = entries.len();
    let cards: Vec<ExtractedCard> = entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|entry| card_from_entry(entry, base.as_ref(), page_url))
        .collect();

    if cards.len() < total {
        debug!(
            "Discarded {} of {} model entries for {}",
            total - cards.len(),
            total,
            page_url
        );
    }
    cards
}

fn card_from_entry(
    entry: &Map<String, Value>,
    base: Option<&Url>,
    page_url: &str,
) -> Option<ExtractedCard> {
    let name = string_field(entry, "name")?;
    let raw_image = string_field(entry, "imageUrl")?;
    let image_url = resolve_url(base, &raw_image)?;

    let source_url = string_field(entry, "sourceUrl")
        .and_then(|u| resolve_url(base, &u))
        .unwrap_or_else(|| page_url.to_string());

    Some(ExtractedCard {
        name,
        image_url,
        group_name: string_field(entry, "groupName"),
        member_name: string_field(entry, "memberName"),
        series: string_field(entry, "series"),
        rarity: string_field(entry, "rarity"),
        release_date: string_field(entry, "releaseDate"),
        source_url: Some(source_url),
    })
}

fn string_field(entry: &Map<String, Value>, key: &str) -> Option<String> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Make `raw` absolute against `base`; only http(s) results are accepted.
fn resolve_url(base: Option<&Url>, raw: &str) -> Option<String> {
    let resolved = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// Parse a classification reply, defaulting to "not a listing".
pub fn parse_page_analysis(reply: &str) -> PageAnalysis {
    let parsed = find_json_object(reply).and_then(|obj| serde_json::from_str::<Value>(obj).ok());
    let Some(Value::Object(fields)) = parsed else {
        warn!("Model classification reply was not a JSON object");
        return PageAnalysis::default();
    };

    PageAnalysis {
        is_card_listing: fields
            .get("isCardListing")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        card_selector: string_field(&fields, "cardSelector"),
        name_selector: string_field(&fields, "nameSelector"),
        image_selector: string_field(&fields, "imageSelector"),
        next_page_selector: string_field(&fields, "nextPageSelector"),
        notes: string_field(&fields, "notes"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LlmSourceConfig;
    use crate::utils::TRUNCATION_MARKER;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const PAGE: &str = "https://shop.example/twice/cards";

    struct FakeBackend {
        reply: Result<String, u16>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(status),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl CompletionBackend for FakeBackend {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(status) => Err(LlmError::Api {
                    status: *status,
                    body: "boom".to_string(),
                    retry_after: None,
                }),
            }
        }
    }

    #[test]
    fn test_parses_array_embedded_in_prose() {
        let reply = r#"Here are the cards:
[{"name": "Nayeon A", "imageUrl": "https://cdn.example/a.jpg", "series": "Formula of Love"}]
Hope this helps!"#;
        let cards = parse_cards(reply, PAGE);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].name, "Nayeon A");
        assert_eq!(cards[0].series.as_deref(), Some("Formula of Love"));
        assert_eq!(cards[0].source_url.as_deref(), Some(PAGE));
    }

    #[test]
    fn test_no_array_yields_empty() {
        assert!(parse_cards("I could not find any cards.", PAGE).is_empty());
        assert!(parse_cards("] backwards [", PAGE).is_empty());
    }

    #[test]
    fn test_malformed_json_yields_empty() {
        assert!(parse_cards(r#"[{"name": "A", "imageUrl": }]"#, PAGE).is_empty());
    }

    #[test]
    fn test_entries_missing_required_fields_are_dropped() {
        let reply = r#"[
            {"name": "Keep", "imageUrl": "https://cdn.example/k.jpg"},
            {"name": "", "imageUrl": "https://cdn.example/e.jpg"},
            {"name": "No image"},
            {"name": 42, "imageUrl": "https://cdn.example/n.jpg"},
            {"imageUrl": "https://cdn.example/x.jpg"},
            "just a string"
        ]"#;
        let cards = parse_cards(reply, PAGE);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].name, "Keep");
    }

    #[test]
    fn test_optional_fields_must_be_strings() {
        let reply = r#"[{"name": "A", "imageUrl": "https://cdn.example/a.jpg",
            "rarity": 5, "memberName": "Mina", "groupName": null, "releaseDate": "2021-11-12"}]"#;
        let cards = parse_cards(reply, PAGE);
        assert_eq!(cards[0].rarity, None);
        assert_eq!(cards[0].member_name.as_deref(), Some("Mina"));
        assert_eq!(cards[0].group_name, None);
        assert_eq!(cards[0].release_date.as_deref(), Some("2021-11-12"));
    }

    #[test]
    fn test_relative_image_urls_resolved_against_page() {
        let reply = r#"[
            {"name": "Rel", "imageUrl": "/img/rel.png"},
            {"name": "Proto", "imageUrl": "//cdn.example/p.png"},
            {"name": "Data", "imageUrl": "data:image/png;base64,AAAA"}
        ]"#;
        let cards = parse_cards(reply, PAGE);
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].image_url, "https://shop.example/img/rel.png");
        assert_eq!(cards[1].image_url, "https://cdn.example/p.png");
    }

    #[test]
    fn test_page_analysis_defaults_to_not_listing() {
        assert_eq!(parse_page_analysis("no idea"), PageAnalysis::default());
        assert!(!parse_page_analysis(r#"{"isCardListing": "yes"}"#).is_card_listing);

        let analysis = parse_page_analysis(
            r#"Sure: {"isCardListing": true, "cardSelector": ".product", "imageSelector": "img.main"}"#,
        );
        assert!(analysis.is_card_listing);
        let selectors = analysis.to_selector_config();
        assert_eq!(selectors.card_selector.as_deref(), Some(".product"));
        assert_eq!(selectors.image_selector.as_deref(), Some("img.main"));
        assert_eq!(selectors.name_selector, None);
    }

    #[tokio::test]
    async fn test_extract_sanitizes_and_truncates_content() {
        let backend = FakeBackend::replying("[]");
        let extractor = CardExtractor::new(backend.clone()).with_max_content_chars(20);
        let html = format!(
            "<script>track()</script><div>{}</div>",
            "x".repeat(100)
        );

        let cards = extractor
            .extract_cards(&html, PAGE, ExtractionContext::default())
            .await
            .unwrap();
        assert!(cards.is_empty());

        let prompt = backend.last_prompt();
        assert!(!prompt.contains("track()"));
        assert!(prompt.ends_with(TRUNCATION_MARKER));
        assert!(prompt.contains("collectible cards"));
    }

    #[tokio::test]
    async fn test_source_prompt_and_group_fallback() {
        let backend = FakeBackend::replying(
            r#"[{"name": "Momo", "imageUrl": "a.jpg"}, {"name": "Jihyo", "imageUrl": "b.jpg", "groupName": "Other"}]"#,
        );
        let extractor = CardExtractor::new(backend.clone());
        let source = Source::new(
            "twice".to_string(),
            "Twice Shop".to_string(),
            SourceKind::Llm(LlmSourceConfig {
                prompt: Some("List every TWICE photocard.".to_string()),
            }),
            PAGE.to_string(),
        )
        .with_group("TWICE");

        let cards = extractor
            .extract_cards("<ul></ul>", PAGE, ExtractionContext::for_source(&source))
            .await
            .unwrap();

        assert!(backend.last_prompt().starts_with("List every TWICE photocard."));
        assert_eq!(cards[0].group_name.as_deref(), Some("TWICE"));
        assert_eq!(cards[0].image_url, "https://shop.example/twice/a.jpg");
        assert_eq!(cards[1].group_name.as_deref(), Some("Other"));
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let extractor = CardExtractor::new(FakeBackend::failing(500));
        let err = extractor
            .extract_cards("<p></p>", PAGE, ExtractionContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 500, .. }));
    }
}
