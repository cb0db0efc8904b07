//! klmbr: character-level random rewrites of the input.
//!
//! Boosts completion diversity by rewriting a percentage of characters in
//! the selected messages (case swaps, diacritics, leetspeak, vowel
//! removal). The original-to-modified word mapping is kept in node meta.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{Map, Value};
use tracing::debug;

use crate::chat::Chat;
use crate::error::BoostError;
use crate::selection;
use crate::session::{CompletionOptions, Session};

use super::Module;

const DOCS: &str = "\
`klmbr` - Kalambur

Boosts model creativity by applying character-level random rewrites to the
input. Rewrite percentage, rewrite kinds, and message selection are
configurable.";

const ALL_MODS: &[&str] = &["capitalize", "diacritic", "leetspeak", "remove_vowel"];
const DIACRITICS: &[char] = &['\u{300}', '\u{301}', '\u{302}', '\u{303}', '\u{308}', '\u{304}'];
const PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':'];

fn leetspeak_char(c: char) -> Option<char> {
    match c.to_ascii_lowercase() {
        'a' => Some('4'),
        'e' => Some('3'),
        'i' => Some('1'),
        'o' => Some('0'),
        's' => Some('5'),
        't' => Some('7'),
        'b' => Some('8'),
        'g' => Some('9'),
        'l' => Some('1'),
        _ => None,
    }
}

fn is_standalone_vowel(chars: &[char], idx: usize) -> bool {
    if idx >= chars.len() || !"aeiouAEIOU".contains(chars[idx]) {
        return false;
    }
    let prev_is_space = idx == 0 || chars[idx - 1].is_whitespace();
    let next_is_space = idx == chars.len() - 1 || chars[idx + 1].is_whitespace();
    prev_is_space || next_is_space
}

fn apply_mod<R: Rng>(rng: &mut R, name: &str, chars: &[char], idx: usize) -> String {
    let c = chars[idx];
    match name {
        "capitalize" => {
            if c.is_uppercase() {
                c.to_lowercase().collect()
            } else {
                c.to_uppercase().collect()
            }
        }
        "diacritic" => {
            if c.is_alphabetic() {
                let mark = DIACRITICS[rng.gen_range(0..DIACRITICS.len())];
                format!("{c}{mark}")
            } else {
                c.to_string()
            }
        }
        "leetspeak" => {
            if is_standalone_vowel(chars, idx) {
                c.to_string()
            } else {
                leetspeak_char(c).map(String::from).unwrap_or_else(|| c.to_string())
            }
        }
        "remove_vowel" => {
            if !is_standalone_vowel(chars, idx) && "aeiou".contains(c.to_ascii_lowercase()) {
                String::new()
            } else {
                c.to_string()
            }
        }
        _ => c.to_string(),
    }
}

/// The word span (char indices) containing `idx`, when it falls on a word.
fn word_span(chars: &[char], idx: usize) -> Option<(usize, usize)> {
    if chars[idx].is_whitespace() {
        return None;
    }
    let mut start = idx;
    while start > 0 && !chars[start - 1].is_whitespace() {
        start -= 1;
    }
    let mut end = idx + 1;
    while end < chars.len() && !chars[end].is_whitespace() {
        end += 1;
    }
    Some((start, end))
}

fn trim_punctuation(word: &str) -> String {
    word.trim_end_matches(PUNCTUATION).to_string()
}

/// Rewrites `percentage` percent of characters with random mods from
/// `mods` (`all` expands to the full set). Returns the modified text and
/// the modified-word to original-word mapping.
pub(crate) fn modify_text<R: Rng>(
    rng: &mut R,
    text: &str,
    percentage: u32,
    mods: &[String],
) -> (String, Map<String, Value>) {
    if text.is_empty() {
        return (String::new(), Map::new());
    }

    let targets: Vec<&str> = if mods.first().map(String::as_str) == Some("all") {
        ALL_MODS.to_vec()
    } else {
        mods.iter().map(String::as_str).collect()
    };
    if targets.is_empty() {
        return (text.to_string(), Map::new());
    }

    let chars: Vec<char> = text.chars().collect();
    let count = ((chars.len() * percentage as usize) / 100).max(1).min(chars.len());
    let mut indices: Vec<usize> = rand::seq::index::sample(rng, chars.len(), count).into_vec();
    indices.sort_unstable();

    let mut replacements: HashMap<usize, String> = HashMap::new();
    let mut mapping = Map::new();

    for idx in indices {
        let Some(mod_name) = targets.choose(rng) else {
            continue;
        };
        let Some((start, end)) = word_span(&chars, idx) else {
            continue;
        };
        let original_word: String = chars[start..end].iter().collect();
        replacements.insert(idx, apply_mod(rng, mod_name, &chars, idx));

        let modified_word: String = (start..end)
            .map(|i| {
                replacements
                    .get(&i)
                    .cloned()
                    .unwrap_or_else(|| chars[i].to_string())
            })
            .collect();
        if modified_word != original_word {
            mapping.insert(
                trim_punctuation(&modified_word),
                Value::String(trim_punctuation(&original_word)),
            );
        }
    }

    let modified: String = (0..chars.len())
        .map(|i| {
            replacements
                .get(&i)
                .cloned()
                .unwrap_or_else(|| chars[i].to_string())
        })
        .collect();
    (modified, mapping)
}

pub struct Klmbr;

#[async_trait]
impl Module for Klmbr {
    fn name(&self) -> &'static str {
        "klmbr"
    }

    fn id_prefix(&self) -> &'static str {
        "klmbr"
    }

    fn docs(&self) -> Option<&'static str> {
        Some(DOCS)
    }

    async fn apply(&self, chat: &mut Chat, session: &Arc<Session>) -> Result<(), BoostError> {
        let cfg = &session.config().klmbr;
        debug!(
            "klmbr: strat={} params={:?} percentage={} mods={:?}",
            cfg.strat, cfg.strat_params, cfg.percentage, cfg.mods
        );

        let nodes = selection::apply_strategy(chat, &cfg.strat, &cfg.strat_params)?;
        for id in nodes {
            let content = chat.node(id).content.clone();
            let (modified, mapping) = {
                let mut rng = rand::thread_rng();
                modify_text(&mut rng, &content, cfg.percentage, &cfg.mods)
            };
            let node = chat.node_mut(id);
            node.content = modified;
            node.meta.insert("klmbr".to_string(), Value::Object(mapping));
        }

        let tail = chat.tail_node().content.clone();
        session.emit_status(&tail);
        session
            .stream_final_completion(chat, CompletionOptions::default())
            .await?;
        Ok(())
    }
}
