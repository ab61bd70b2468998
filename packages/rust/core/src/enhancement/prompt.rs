//! Prompt construction and response interpretation per span kind.

use thesisforge_shared::ChapterType;

use super::{EnhancementRequest, EnhancementResult, SpanKind};

/// Keywords requested per language.
pub const KEYWORD_COUNT: usize = 5;

const KEYWORD_INPUT_CHARS: usize = 2000;
const SUMMARY_INPUT_CHARS: usize = 3000;
const KEYWORD_MAX_TOKENS: u32 = 100;

/// A rendered prompt plus the completion budget it needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub text: String,
    pub max_tokens: u32,
}

/// Word ceiling for a chapter summary, if the chapter is summarized at all.
pub fn summary_word_limit(chapter_type: ChapterType) -> Option<u32> {
    match chapter_type {
        ChapterType::Methods => Some(300),
        ChapterType::ResultsDiscussion => Some(400),
        ChapterType::Conclusion => Some(200),
        _ => None,
    }
}

fn section_label(chapter_type: ChapterType) -> &'static str {
    match chapter_type {
        ChapterType::Methods => "methodology",
        ChapterType::ResultsDiscussion => "results",
        ChapterType::Conclusion => "conclusions",
        other => other.as_str(),
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Build the prompt for a request. `default_max_tokens` applies to
/// abstract rewrites; other spans carry their own budget.
pub fn build(request: &EnhancementRequest, default_max_tokens: u32) -> Prompt {
    match request.span {
        SpanKind::Abstract(language) => Prompt {
            text: format!(
                "Improve the following research abstract for a journal article in {lang}.\n\n\
                 Requirements:\n\
                 - Keep it between 150-250 words\n\
                 - Clear structure: background, objectives, methods, results, conclusions\n\
                 - Use academic language\n\
                 - Keep all specific findings and data\n\
                 - Do NOT add information not in the original text\n\n\
                 Original abstract:\n{text}\n\n\
                 Enhanced abstract:",
                lang = language.display_name(),
                text = request.text,
            ),
            max_tokens: default_max_tokens,
        },
        SpanKind::Keywords(language) => Prompt {
            text: format!(
                "Extract {KEYWORD_COUNT} most relevant keywords from the following text in {lang}.\n\n\
                 Return ONLY the keywords separated by commas, nothing else.\n\n\
                 Text:\n{text}\n\n\
                 Keywords:",
                lang = language.display_name(),
                text = truncate_chars(&request.text, KEYWORD_INPUT_CHARS),
            ),
            max_tokens: KEYWORD_MAX_TOKENS,
        },
        SpanKind::Summary(chapter_type) => {
            let max_words = summary_word_limit(chapter_type).unwrap_or(300);
            Prompt {
                text: format!(
                    "Summarize the following {section} section from a thesis into a concise \
                     paragraph suitable for a journal article (maximum {max_words} words).\n\n\
                     Focus on:\n\
                     - Key points and findings\n\
                     - Methodology or approach (if applicable)\n\
                     - Main conclusions or implications\n\n\
                     Text to summarize:\n{text}\n\n\
                     Summary:",
                    section = section_label(chapter_type),
                    text = truncate_chars(&request.text, SUMMARY_INPUT_CHARS),
                ),
                max_tokens: max_words * 2,
            }
        }
    }
}

/// Split a comma or newline separated keyword list.
pub fn parse_keywords(response: &str) -> Vec<String> {
    response
        .split([',', '\n', ';'])
        .map(|k| {
            k.trim()
                .trim_start_matches(|c: char| c == '-' || c == '*' || c == '•' || c.is_ascii_digit() || c == '.')
                .trim()
                .trim_matches('"')
                .to_string()
        })
        .filter(|k| !k.is_empty())
        .take(KEYWORD_COUNT)
        .collect()
}

/// Turn a raw completion into a result for the request's span.
pub fn interpret(request: &EnhancementRequest, completion: &str) -> EnhancementResult {
    let completion = completion.trim();
    match request.span {
        SpanKind::Keywords(_) => EnhancementResult {
            enhanced_text: request.text.clone(),
            keywords: parse_keywords(completion),
        },
        SpanKind::Abstract(_) | SpanKind::Summary(_) => EnhancementResult {
            enhanced_text: completion.to_string(),
            keywords: Vec::new(),
        },
    }
}
