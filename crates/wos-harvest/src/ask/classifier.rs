//! Guess which column a natural-language question is about.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::Column;

/// Maps a question to the column it most likely concerns.
pub trait ColumnClassifier: Send + Sync {
    /// Best column for `question`, or `None` when nothing matches.
    fn classify(&self, question: &str) -> Option<Column>;
}

/// Capitalized words, Turkish capitals included.
static CAPITALIZED_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\p{Lu}\p{L}*\b").expect("capitalized word regex is valid") // Static pattern
});

/// Capitalized words that start questions rather than name people.
const QUESTION_WORDS: &[&str] = &[
    "how", "what", "which", "who", "when", "where", "why", "list", "show", "give", "is", "are",
    "does", "do", "the", "kaç", "kim", "hangi", "ne", "en", "nedir",
];

const ORGANIZATION_TERMS: &[&str] =
    &["üniversite", "university", "uni", "okul", "kurum", "kuruluş", "organization", "institution"];

const AUTHOR_TERMS: &[&str] = &[
    "yazar", "author", "araştırmacı", "researcher", "akademisyen", "kim", "who", "yayın yapan", "kişi",
    "ad soyad",
];

const CITATION_TERMS: &[&str] =
    &["atıf", "citation", "cited", "alıntı", "referans", "atıf sayısı", "toplam atıf"];

const YEAR_TERMS: &[&str] = &["yıl", "year", "tarih", "zaman", "yayın yılı", "ne zaman", "when"];

/// Scores in descending precedence.
const ORGANIZATION_SCORE: f32 = 10.0;
const AUTHOR_SCORE: f32 = 9.0;
const CITATION_SCORE: f32 = 8.0;
const YEAR_SCORE: f32 = 7.0;
const GENERAL_SCORE: f32 = 2.0;
const WEAK_SCORE: f32 = 0.5;

/// Keyword heuristic with fixed priorities.
///
/// Organization, author, citation and year cues win over everything else;
/// other columns score on their own keyword lists, with `UID` and `Title`
/// weakest because their cues are so generic.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Every column with a non-zero score, in column order.
    #[must_use]
    pub fn scores(&self, question: &str) -> Vec<(Column, f32)> {
        let lower = question.to_lowercase();
        let mentions = |terms: &[&str]| terms.iter().any(|term| mentions_term(&lower, term));

        let mut scores: Vec<(Column, f32)> = Vec::new();
        let mut set = |column: Column, score: f32| {
            if !scores.iter().any(|(c, _)| *c == column) {
                scores.push((column, score));
            }
        };

        if mentions(ORGANIZATION_TERMS) {
            set(Column::Organization, ORGANIZATION_SCORE);
        }
        if mentions(AUTHOR_TERMS) || has_name_like_word(question) {
            set(Column::AuthorDisplayName, AUTHOR_SCORE);
        }
        if mentions(CITATION_TERMS) {
            set(Column::CitationCount, CITATION_SCORE);
        }
        if mentions(YEAR_TERMS) {
            set(Column::PublishYear, YEAR_SCORE);
        }

        for column in Column::ALL {
            if mentions(column_terms(column)) {
                let score = if matches!(column, Column::Uid | Column::Title) { WEAK_SCORE } else { GENERAL_SCORE };
                set(column, score);
            }
        }

        scores
    }
}

impl ColumnClassifier for KeywordClassifier {
    fn classify(&self, question: &str) -> Option<Column> {
        let mut best: Option<(Column, f32)> = None;
        for (column, score) in self.scores(question) {
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((column, score));
            }
        }
        best.map(|(column, _)| column)
    }
}

/// True when `term` starts a word of `text`.
///
/// Suffixes are allowed so inflected forms match ("dergide", "authors"), except
/// for short ASCII abbreviations ("uni", "doi", "who") which must stand alone.
fn mentions_term(text: &str, term: &str) -> bool {
    let whole_word = term.is_ascii() && term.len() <= 3;
    text.match_indices(term).any(|(start, _)| {
        let starts_word = !text[..start].chars().next_back().is_some_and(char::is_alphanumeric);
        let ends_word = !text[start + term.len()..].chars().next().is_some_and(char::is_alphanumeric);
        starts_word && (!whole_word || ends_word)
    })
}

/// A capitalized word that neither opens a sentence nor is a question word.
fn has_name_like_word(question: &str) -> bool {
    CAPITALIZED_WORD.find_iter(question).any(|m| {
        let before = question[..m.start()].trim_end();
        let opens_sentence = before.is_empty() || before.ends_with(['.', '!', '?', ':']);
        !opens_sentence && !QUESTION_WORDS.contains(&m.as_str().to_lowercase().as_str())
    })
}

fn column_terms(column: Column) -> &'static [&'static str] {
    match column {
        Column::Uid => &["unique id", "benzersiz kimlik", "uid", "yayın kimliği"],
        Column::Title => &["başlık", "title", "yayın adı", "makale başlığı"],
        Column::DocumentType => &["tür", "type", "kategori", "yayın türü", "belge türü"],
        Column::SourceType => &["kaynak türü", "source type", "dergi türü", "platform"],
        Column::SourceTitle => &["dergi", "journal", "source", "kaynak", "yayın organı"],
        Column::PublishYear => YEAR_TERMS,
        Column::Volume => &["cilt", "volume"],
        Column::Issue => &["sayı", "issue"],
        Column::Pages => &["sayfa", "pages", "page range"],
        Column::Doi => &["doi", "digital object identifier"],
        Column::Issn => &["issn", "dergi kodu"],
        Column::AuthorKeywords => &["anahtar kelime", "keyword", "konu", "topic", "alan"],
        Column::AuthorDisplayName => AUTHOR_TERMS,
        Column::AuthorWosStandard => &["wos yazar", "web of science", "wos standard", "standardize"],
        Column::AuthorResearcherId => &["researcher id", "yazar kimliği", "orcid"],
        Column::CitationDb => &["atıf veritabanı", "citation database", "veri tabanı"],
        Column::CitationCount => CITATION_TERMS,
        Column::Organization => ORGANIZATION_TERMS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(question: &str) -> Option<Column> {
        KeywordClassifier::new().classify(question)
    }

    #[test]
    fn test_organization_wins() {
        assert_eq!(classify("Yaşar Üniversitesi kaç yayın yapmış?"), Some(Column::Organization));
        assert_eq!(classify("which university has the most citations"), Some(Column::Organization));
    }

    #[test]
    fn test_capitalized_name_means_author() {
        assert_eq!(classify("Ahmet Yılmaz kaç yayın yapmış?"), Some(Column::AuthorDisplayName));
        assert_eq!(classify("How many papers did Taşgetiren write?"), Some(Column::AuthorDisplayName));
    }

    #[test]
    fn test_question_words_are_not_names() {
        assert_eq!(classify("How many citations in total?"), Some(Column::CitationCount));
        assert_eq!(classify("what year had the most output"), Some(Column::PublishYear));
    }

    #[test]
    fn test_general_columns() {
        assert_eq!(classify("en çok yayın hangi dergide"), Some(Column::SourceTitle));
        assert_eq!(classify("missing doi count"), Some(Column::Doi));
    }

    #[test]
    fn test_generic_columns_score_low() {
        let scores = KeywordClassifier::new().scores("list every title in the issue");
        let title = scores.iter().find(|(c, _)| *c == Column::Title).map(|(_, s)| *s);
        let issue = scores.iter().find(|(c, _)| *c == Column::Issue).map(|(_, s)| *s);
        assert_eq!(title, Some(WEAK_SCORE));
        assert_eq!(issue, Some(GENERAL_SCORE));
        assert_eq!(classify("list every title in the issue"), Some(Column::Issue));
    }

    #[test]
    fn test_terms_match_at_word_start() {
        assert!(mentions_term("yaşar üniversitesi", "üniversite"));
        assert!(mentions_term("which journals", "journal"));
        assert!(!mentions_term("community papers", "uni"));
        assert!(!mentions_term("per unit", "uni"));
        assert!(mentions_term("best uni?", "uni"));
        assert!(!mentions_term("subjournal", "journal"));
    }

    #[test]
    fn test_sentence_initial_word_is_not_a_name() {
        assert_eq!(classify("Journals with most papers?"), Some(Column::SourceTitle));
        assert_eq!(classify("Community papers per unit?"), None);
        assert_eq!(classify("Papers by Demir?"), Some(Column::AuthorDisplayName));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(classify("hmm?"), None);
    }
}
