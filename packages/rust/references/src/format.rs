//! APA rendering.

use thesisforge_shared::Reference;

/// Render `Authors. (Year). Title. Source.`
///
/// Author lists follow APA joining: `A`, `A, & B`, `A, B, & C`.
pub fn format_apa(reference: &Reference) -> String {
    let authors = join_authors(&reference.authors);
    let mut out = format!("{}. ({}). ", authors.trim_end_matches('.'), reference.year);

    out.push_str(&reference.title);
    if !reference.title.ends_with(['?', '!', '.']) {
        out.push('.');
    }

    if !reference.source.is_empty() {
        out.push(' ');
        out.push_str(&reference.source);
        if !reference.source.ends_with('.') {
            out.push('.');
        }
    }

    out
}

fn join_authors(authors: &[String]) -> String {
    match authors {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{}, & {}", init.join(", "), last),
    }
}

/// Format every reference, preserving order.
pub fn render_bibliography(references: &[Reference]) -> Vec<String> {
    references.iter().map(format_apa).collect()
}

#[cfg(test)]
mod tests {
    use thesisforge_shared::SourceType;

    use super::*;
    use crate::normalize::IdentityKey;
    use crate::parse::parse_entry;

    #[test]
    fn formats_author_lists() {
        let mut r = Reference {
            authors: vec!["Evans, M.".into()],
            year: 2021,
            title: "Data analysis techniques".into(),
            source: "Statistical Methods Quarterly, 15(4), 567-589".into(),
            source_type: SourceType::Journal,
            raw: String::new(),
        };
        assert_eq!(
            format_apa(&r),
            "Evans, M. (2021). Data analysis techniques. Statistical Methods Quarterly, 15(4), 567-589."
        );

        r.authors.push("Wilson, T.".into());
        assert!(format_apa(&r).starts_with("Evans, M., & Wilson, T. (2021)."));

        r.authors.push("Garcia, L.".into());
        assert!(format_apa(&r).starts_with("Evans, M., Wilson, T., & Garcia, L. (2021)."));
    }

    #[test]
    fn reparsing_formatted_entries_keeps_the_identity_key() {
        let inputs = [
            "Brown, P., Smith, K., & Johnson, M. (2018). Advances in machine learning. Journal of AI Research, 45(2), 123-145.",
            "Davis, R. (2019). Research methodology in social sciences (3rd ed.). Academic Press.",
            "Putra, D. 2022. Sistem rekomendasi berbasis konten. Prosiding Seminar Nasional Informatika",
            "O'Brien, T., & Murphy, C. (2023). Innovative teaching approaches. Teaching and Teacher Education, 41(2), 234-256.",
            "Santoso, B. dan Wijaya, A. (2020). Does feedback work? Jurnal Pendidikan, 9(1).",
        ];

        for input in inputs {
            let parsed = parse_entry(input).unwrap();
            let formatted = format_apa(&parsed);
            let reparsed = parse_entry(&formatted).unwrap();
            assert_eq!(
                IdentityKey::of(&parsed),
                IdentityKey::of(&reparsed),
                "identity drifted for {formatted}"
            );
            assert_eq!(format_apa(&reparsed), formatted);
        }
    }
}
