//! Free-text search compiler.
//!
//! A query is a whitespace separated list of terms. `#name` requires the tag `name` (exact,
//! case-sensitive); any other term must appear in the article title, ignoring ASCII case.
//! All terms must hold. Values only ever reach SQLite as bound parameters: the generated
//! SQL text is built exclusively from the fixed fragments below.

use crate::error::{AppError, Result};

const TAG_CLAUSE: &str =
    "EXISTS (SELECT 1 FROM json_each(articles.tags) WHERE json_each.value = ?)";
const TITLE_CLAUSE: &str = "instr(lower(articles.title), lower(?)) > 0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Tag(String),
    Title(String),
}

/// Conjunction of per-term conditions, with its positional parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    clauses: Vec<&'static str>,
    params: Vec<String>,
}

impl Predicate {
    pub fn match_all() -> Self {
        Self::default()
    }

    fn push(&mut self, term: Term) {
        match term {
            Term::Tag(tag) => {
                self.clauses.push(TAG_CLAUSE);
                self.params.push(tag);
            }
            Term::Title(word) => {
                self.clauses.push(TITLE_CLAUSE);
                self.params.push(word);
            }
        }
    }

    /// SQL boolean expression with one `?` per entry of [`Predicate::params`].
    pub fn sql(&self) -> String {
        if self.clauses.is_empty() {
            return "1".to_string();
        }
        self.clauses.join(" AND ")
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn is_match_all(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// True for `[A-Za-z0-9]+`, the alphabet shared by tag names and title terms.
pub fn is_valid_word(word: &str) -> bool {
    !word.is_empty() && word.bytes().all(|b| b.is_ascii_alphanumeric())
}

pub fn parse_term(token: &str) -> Result<Term> {
    let (is_tag, word) = match token.strip_prefix('#') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    if !is_valid_word(word) {
        return Err(AppError::InvalidQuery(format!("bad search term `{}`", token)));
    }
    Ok(if is_tag {
        Term::Tag(word.to_string())
    } else {
        Term::Title(word.to_string())
    })
}

pub fn tokenize(query: &str) -> Result<Vec<Term>> {
    query.split_whitespace().map(parse_term).collect()
}

pub fn compile(query: &str) -> Result<Predicate> {
    let mut predicate = Predicate::match_all();
    for term in tokenize(query)? {
        predicate.push(term);
    }
    Ok(predicate)
}
