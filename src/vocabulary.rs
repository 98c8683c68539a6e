//! Keyword vocabularies for interpreting remote classifier labels
//!
//! A label becomes a style or element tag when its lowercase text contains
//! any keyword of the corresponding table. Bump `VOCABULARY_VERSION` whenever
//! a table changes so stored prompts can be traced to the tables that made them.

/// Version of the keyword tables below
pub const VOCABULARY_VERSION: u32 = 1;

/// Keywords marking a label as describing visual style
pub const STYLE_KEYWORDS: &[&str] = &[
    "cinematic",
    "photorealistic",
    "animation",
    "3d",
    "digital",
    "painting",
    "art",
    "graphic",
    "minimalist",
    "vibrant",
    "dark",
    "bright",
    "colorful",
    "monochrome",
    "professional",
];

/// Keywords marking a label as describing scene content
pub const ELEMENT_KEYWORDS: &[&str] = &[
    "person",
    "people",
    "human",
    "face",
    "building",
    "city",
    "nature",
    "landscape",
    "animal",
    "car",
    "object",
    "text",
    "light",
    "shadow",
    "water",
    "sky",
    "tree",
    "mountain",
];

/// Return the labels matching any keyword, in label order, capped at `limit`
pub fn match_keywords(labels: &[String], keywords: &[&str], limit: usize) -> Vec<String> {
    labels
        .iter()
        .filter(|label| {
            let lowered = label.to_lowercase();
            keywords.iter().any(|keyword| lowered.contains(keyword))
        })
        .take(limit)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_every_style_keyword_matches_itself() {
        for keyword in STYLE_KEYWORDS {
            let matched = match_keywords(&labels(&[keyword]), STYLE_KEYWORDS, 3);
            assert_eq!(matched, vec![keyword.to_string()], "keyword {}", keyword);
        }
    }

    #[test]
    fn test_every_element_keyword_matches_itself() {
        for keyword in ELEMENT_KEYWORDS {
            let matched = match_keywords(&labels(&[keyword]), ELEMENT_KEYWORDS, 4);
            assert_eq!(matched, vec![keyword.to_string()], "keyword {}", keyword);
        }
    }

    #[test]
    fn test_match_is_case_insensitive_substring() {
        let matched = match_keywords(&labels(&["Sports CAR", "Skyscraper", "banana"]), ELEMENT_KEYWORDS, 4);
        assert_eq!(matched, labels(&["Sports CAR", "Skyscraper"]));
    }

    #[test]
    fn test_match_respects_limit_and_order() {
        let input = labels(&["dark alley", "digital art", "bright room", "3d render"]);
        let matched = match_keywords(&input, STYLE_KEYWORDS, 3);
        assert_eq!(matched, labels(&["dark alley", "digital art", "bright room"]));
    }

    #[test]
    fn test_no_matches() {
        assert!(match_keywords(&labels(&["banana", "spoon"]), STYLE_KEYWORDS, 3).is_empty());
        assert!(match_keywords(&[], ELEMENT_KEYWORDS, 4).is_empty());
    }
}
