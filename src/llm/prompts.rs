//! Prompt templates for card extraction and page classification.

/// Reply format appended to every extraction instruction.
const CARD_FORMAT_INSTRUCTIONS: &str = r#"Respond with ONLY a JSON array. Each element describes one card:
{"name": string, "imageUrl": string, "series"?: string, "memberName"?: string, "groupName"?: string, "rarity"?: string, "releaseDate"?: string}

Rules:
- "name" and "imageUrl" are required; skip cards without a visible image.
- Use the image URL exactly as it appears in the page (src, data-src or srcset).
- Omit optional fields you cannot find. Do not guess.
- If the page shows no cards, respond with []."#;

const ANALYSIS_INSTRUCTIONS: &str = r#"You are inspecting a web page to decide whether it lists collectible trading cards or photocards.

Respond with ONLY a JSON object:
{"isCardListing": boolean, "cardSelector"?: string, "nameSelector"?: string, "imageSelector"?: string, "nextPageSelector"?: string, "notes"?: string}

Selectors must be CSS selectors that would match the repeated card element, its name, its image, and the pagination link."#;

/// Instruction used when a source has no prompt of its own.
pub fn default_card_instruction(group_name: Option<&str>, category: Option<&str>) -> String {
    let subject = match (group_name, category) {
        (Some(group), Some(category)) => format!("{} {} cards", group, category),
        (Some(group), None) => format!("{} photocards", group),
        (None, Some(category)) => format!("{} cards", category),
        (None, None) => "collectible cards".to_string(),
    };
    format!(
        "Extract every {} shown on this page, including the card name and its image URL.",
        subject
    )
}

/// Full extraction prompt: instruction, reply format, then page content.
pub fn build_extraction_prompt(instruction: &str, page_url: &str, content: &str) -> String {
    format!(
        "{}\n\n{}\n\nPage URL: {}\n\nPage HTML:\n{}",
        instruction.trim(),
        CARD_FORMAT_INSTRUCTIONS,
        page_url,
        content
    )
}

/// Page classification prompt.
pub fn build_analysis_prompt(page_url: &str, content: &str) -> String {
    format!(
        "{}\n\nPage URL: {}\n\nPage HTML:\n{}",
        ANALYSIS_INSTRUCTIONS, page_url, content
    )
}
