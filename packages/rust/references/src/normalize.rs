//! Key normalization, deduplication and APA ordering.

use std::cmp::Ordering;
use std::collections::HashMap;

use thesisforge_shared::Reference;

/// Characters of the normalized title that take part in the identity key.
const TITLE_PREFIX_CHARS: usize = 50;

/// Normalized `(surname, year, title prefix)` triple identifying one work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub surname: String,
    pub year: i32,
    pub title_prefix: String,
}

impl IdentityKey {
    pub fn of(reference: &Reference) -> Self {
        let title = normalize_for_key(&reference.title);
        Self {
            surname: normalize_for_key(reference.primary_surname()),
            year: reference.year,
            title_prefix: title.chars().take(TITLE_PREFIX_CHARS).collect(),
        }
    }
}

/// Lowercase, fold diacritics, drop punctuation, collapse whitespace.
pub fn normalize_for_key(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        match fold_char(c) {
            Some(base) => out.push_str(base),
            None if c.is_alphanumeric() => out.push(c),
            None => out.push(' '),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map a lowercase Latin letter with a diacritic to its base form.
fn fold_char(c: char) -> Option<&'static str> {
    let base = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'ç' | 'ć' | 'č' => "c",
        'ď' | 'đ' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => "e",
        'ğ' => "g",
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'ı' => "i",
        'ł' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => "o",
        'ř' => "r",
        'ś' | 'š' | 'ş' => "s",
        'ß' => "ss",
        'ť' | 'ţ' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        'æ' => "ae",
        'œ' => "oe",
        _ => return None,
    };
    Some(base)
}

/// Collapse entries with the same identity key, keeping the longest raw
/// string of each group in first-seen order. Applying it twice is a no-op.
pub fn deduplicate(references: Vec<Reference>) -> Vec<Reference> {
    let mut slots: HashMap<IdentityKey, usize> = HashMap::new();
    let mut kept: Vec<Reference> = Vec::with_capacity(references.len());

    for reference in references {
        let key = IdentityKey::of(&reference);
        match slots.get(&key) {
            Some(&idx) => {
                if reference.raw.len() > kept[idx].raw.len() {
                    kept[idx] = reference;
                }
            }
            None => {
                slots.insert(key, kept.len());
                kept.push(reference);
            }
        }
    }

    kept
}

/// APA ordering: primary surname, then year, then title; case-insensitive.
pub fn apa_order(a: &Reference, b: &Reference) -> Ordering {
    normalize_for_key(a.primary_surname())
        .cmp(&normalize_for_key(b.primary_surname()))
        .then(a.year.cmp(&b.year))
        .then_with(|| normalize_for_key(&a.title).cmp(&normalize_for_key(&b.title)))
}

pub fn sort_apa(references: &mut [Reference]) {
    references.sort_by(apa_order);
}

#[cfg(test)]
mod tests {
    use thesisforge_shared::SourceType;

    use super::*;

    fn reference(author: &str, year: i32, title: &str, raw: &str) -> Reference {
        Reference {
            authors: vec![author.to_string()],
            year,
            title: title.to_string(),
            source: "Jurnal Pendidikan".into(),
            source_type: SourceType::Journal,
            raw: raw.to_string(),
        }
    }

    #[test]
    fn normalization_folds_case_accents_and_punctuation() {
        assert_eq!(normalize_for_key("  Müller-Lüdenscheidt,  J. "), "muller ludenscheidt j");
        assert_eq!(normalize_for_key("Straße"), "strasse");
        assert_eq!(normalize_for_key("DEEP   Learning: A Review"), "deep learning a review");
    }

    #[test]
    fn case_and_whitespace_variants_share_a_key() {
        let a = reference("Brown, P.", 2018, "Advances in Machine Learning", "a");
        let b = reference("BROWN, P.", 2018, "advances  in machine   learning", "b");
        assert_eq!(IdentityKey::of(&a), IdentityKey::of(&b));
    }

    #[test]
    fn dedup_keeps_longest_raw() {
        let short = reference("Brown, P.", 2018, "Advances", "Brown (2018). Advances.");
        let long = reference(
            "Brown, P.",
            2018,
            "advances",
            "Brown, P. (2018). Advances. Journal of AI Research, 45(2), 123-145.",
        );
        let other = reference("Chen, X.", 2020, "Deep learning", "Chen (2020).");

        let deduped = deduplicate(vec![short, other.clone(), long.clone()]);
        assert_eq!(deduped, vec![long, other]);
    }

    #[test]
    fn dedup_is_idempotent() {
        let refs = vec![
            reference("Brown, P.", 2018, "Advances", "x"),
            reference("brown, p.", 2018, "ADVANCES", "xyz"),
            reference("Davis, R.", 2019, "Research methodology", "y"),
        ];
        let once = deduplicate(refs);
        let twice = deduplicate(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn ordering_by_surname_then_year_then_title() {
        let mut refs = vec![
            reference("Ölander, T.", 2020, "B", ""),
            reference("davis, R.", 2019, "Z", ""),
            reference("Davis, R.", 2019, "A", ""),
            reference("Davis, R.", 2015, "M", ""),
            reference("Anderson, J.", 2014, "X", ""),
        ];
        sort_apa(&mut refs);
        let order: Vec<_> = refs.iter().map(|r| (r.year, r.title.as_str())).collect();
        assert_eq!(
            order,
            vec![(2014, "X"), (2015, "M"), (2019, "A"), (2019, "Z"), (2020, "B")]
        );
    }
}
