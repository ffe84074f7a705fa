//! Rule-based polarity scoring.
//!
//! Word valences live on a [-4, 4] scale. Each matched word is adjusted for
//! nearby negations and boosters, capitalised emphasis and a contrastive
//! "but"; the sum is then squashed into a compound score in [-1, 1].

use crate::error::Result;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

const BOOST_INCR: f64 = 0.293;
const BOOST_DECR: f64 = -0.293;
const CAPS_INCR: f64 = 0.733;
const NEGATION_SCALAR: f64 = -0.74;
const EXCLAIM_INCR: f64 = 0.292;
const QUESTION_INCR: f64 = 0.18;
const NORMALIZE_ALPHA: f64 = 15.0;

/// Built-in VADER-format lexicon: general vocabulary, market terms, emoticons.
const DEFAULT_LEXICON: &str = include_str!("default_lexicon.tsv");

const BOOSTERS: &[(&str, f64)] = &[
    ("absolutely", BOOST_INCR),
    ("completely", BOOST_INCR),
    ("extremely", BOOST_INCR),
    ("highly", BOOST_INCR),
    ("hugely", BOOST_INCR),
    ("incredibly", BOOST_INCR),
    ("massively", BOOST_INCR),
    ("really", BOOST_INCR),
    ("significantly", BOOST_INCR),
    ("so", BOOST_INCR),
    ("substantially", BOOST_INCR),
    ("totally", BOOST_INCR),
    ("very", BOOST_INCR),
    ("barely", BOOST_DECR),
    ("hardly", BOOST_DECR),
    ("marginally", BOOST_DECR),
    ("slightly", BOOST_DECR),
    ("somewhat", BOOST_DECR),
    ("kinda", BOOST_DECR),
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "neither", "nor", "none", "nobody", "nothing", "nowhere", "cannot",
    "cant", "dont", "doesnt", "didnt", "wont", "wouldnt", "shouldnt", "couldnt", "isnt", "arent",
    "wasnt", "werent", "aint", "without",
];

/// Valence lexicon plus the modifier word lists.
pub struct Lexicon {
    words: HashMap<String, f64>,
    boosters: HashMap<&'static str, f64>,
    negations: HashSet<&'static str>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new()
    }
}

impl Lexicon {
    /// Built-in word list.
    pub fn new() -> Self {
        Self::with_words(parse_vader(DEFAULT_LEXICON))
    }

    fn with_words(words: HashMap<String, f64>) -> Self {
        Self {
            words,
            boosters: BOOSTERS.iter().copied().collect(),
            negations: NEGATIONS.iter().copied().collect(),
        }
    }

    /// Load a VADER-format lexicon: `token<TAB>mean-valence[<TAB>...]` per line.
    pub fn from_vader_file(path: &Path) -> Result<Self> {
        let body = std::fs::read_to_string(path)?;
        let lexicon = Self::with_words(parse_vader(&body));
        info!("Loaded {} lexicon entries from {:?}", lexicon.len(), path);
        Ok(lexicon)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn valence(&self, word: &str) -> Option<f64> {
        self.words.get(word).copied()
    }

    /// Emoticons are looked up as written; words lose surrounding punctuation.
    fn token<'t>(&self, raw: &'t str) -> &'t str {
        if self.words.contains_key(&raw.to_lowercase()) {
            return raw;
        }
        raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != '-')
    }

    fn is_negation(&self, word: &str) -> bool {
        self.negations.contains(word) || word.ends_with("n't")
    }

    /// Compound polarity of `text` in [-1, 1]; 0.0 when nothing matches.
    pub fn compound(&self, text: &str) -> f64 {
        let tokens: Vec<&str> = text
            .split_whitespace()
            .map(|t| self.token(t))
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return 0.0;
        }
        let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();

        let shouting = tokens.iter().filter(|t| is_all_caps(t)).count();
        let cap_contrast = shouting > 0 && shouting < tokens.len();

        let mut valences = vec![0.0; tokens.len()];
        for (i, word) in lowered.iter().enumerate() {
            let Some(mut v) = self.valence(word) else {
                continue;
            };

            if cap_contrast && is_all_caps(tokens[i]) {
                v += CAPS_INCR * v.signum();
            }

            for k in 1..=3 {
                if i < k {
                    break;
                }
                let prev = &lowered[i - k];
                if let Some(&b) = self.boosters.get(prev.as_str()) {
                    let mut scalar = b * v.signum();
                    if cap_contrast && is_all_caps(tokens[i - k]) {
                        scalar += CAPS_INCR * v.signum();
                    }
                    scalar *= match k {
                        1 => 1.0,
                        2 => 0.95,
                        _ => 0.9,
                    };
                    v += scalar;
                }
                if self.is_negation(prev) {
                    v *= NEGATION_SCALAR;
                }
            }

            valences[i] = v;
        }

        // "X but Y": Y carries the opinion.
        if let Some(pivot) = lowered.iter().position(|w| w == "but") {
            for (i, v) in valences.iter_mut().enumerate() {
                if i < pivot {
                    *v *= 0.5;
                } else if i > pivot {
                    *v *= 1.5;
                }
            }
        }

        let mut sum: f64 = valences.iter().sum();
        if sum == 0.0 {
            return 0.0;
        }

        let emphasis = punctuation_emphasis(text);
        sum += emphasis * sum.signum();

        (sum / (sum * sum + NORMALIZE_ALPHA).sqrt()).clamp(-1.0, 1.0)
    }
}

fn is_all_caps(token: &str) -> bool {
    token.chars().any(|c| c.is_alphabetic())
        && token.chars().all(|c| !c.is_alphabetic() || c.is_uppercase())
}

fn punctuation_emphasis(text: &str) -> f64 {
    let exclaims = text.matches('!').count().min(4) as f64;
    let questions = text.matches('?').count();
    let question_boost = match questions {
        0 | 1 => 0.0,
        2 | 3 => questions as f64 * QUESTION_INCR,
        _ => 0.96,
    };
    exclaims * EXCLAIM_INCR + question_boost
}

fn parse_vader(body: &str) -> HashMap<String, f64> {
    body.lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let token = fields.next()?.trim();
            let valence = fields.next()?.trim().parse::<f64>().ok()?;
            if token.is_empty() {
                None
            } else {
                Some((token.to_lowercase(), valence))
            }
        })
        .collect()
}
