// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::rc::Rc;

/// Alternate- and joined-name generation for member matching and dictionary
/// key candidates.
///
/// Alternate names are case-style variants plus the `Id`/`Identifier` pair;
/// joined names combine per-segment alternates into composite keys for
/// multi-level member paths.
#[derive(Debug, Clone, Default)]
pub struct NamingSettings {
    separators: Vec<&'static str>,
}

impl NamingSettings {
    pub fn new() -> NamingSettings {
        NamingSettings {
            separators: vec![".", "_", ""],
        }
    }

    /// Ordered candidate names for one member name, most specific first.
    pub fn alternate_names_for(&self, name: &str) -> Vec<Rc<str>> {
        let mut names: Vec<Rc<str>> = vec![name.into()];
        let mut push = |candidate: String, names: &mut Vec<Rc<str>>| {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&candidate)) {
                names.push(candidate.into());
            }
        };

        push(to_snake(name), &mut names);
        push(to_camel(name), &mut names);
        push(to_pascal(name), &mut names);

        let lower = name.to_ascii_lowercase();
        if let Some(stem) = lower.strip_suffix("identifier") {
            push(format!("{}Id", &name[..stem.len()]), &mut names);
        } else if let Some(stem) = lower.strip_suffix("id") {
            push(format!("{}Identifier", &name[..stem.len()]), &mut names);
        }

        names
    }

    /// Composite keys for a multi-level member path: the cartesian product
    /// of the per-segment alternates, joined by each configured separator.
    pub fn joined_names_for(&self, segment_alternates: &[Vec<Rc<str>>]) -> Vec<Rc<str>> {
        let mut joined = vec![];
        for combination in cartesian(segment_alternates) {
            for sep in &self.separators {
                let name = combination
                    .iter()
                    .map(|s| s.as_ref())
                    .collect::<Vec<_>>()
                    .join(sep);
                if !joined.iter().any(|n: &Rc<str>| n.eq_ignore_ascii_case(&name)) {
                    joined.push(name.into());
                }
            }
        }
        joined
    }

    /// Whether two member names refer to the same thing under any alternate.
    pub fn names_match(&self, a: &str, b: &str) -> bool {
        if a.eq_ignore_ascii_case(b) {
            return true;
        }
        self.alternate_names_for(a)
            .iter()
            .any(|alt| alt.eq_ignore_ascii_case(b))
    }
}

fn cartesian(segments: &[Vec<Rc<str>>]) -> Vec<Vec<Rc<str>>> {
    let mut combos: Vec<Vec<Rc<str>>> = vec![vec![]];
    for segment in segments {
        let mut next = Vec::with_capacity(combos.len() * segment.len());
        for combo in &combos {
            for alt in segment {
                let mut extended = combo.clone();
                extended.push(alt.clone());
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

/// Split an identifier into words on underscores, dashes, and case
/// boundaries.
fn split_words(name: &str) -> Vec<String> {
    let mut words = vec![];
    let mut current = String::new();
    let mut prev_lower = false;
    for c in name.chars() {
        if c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(current.clone());
                current.clear();
            }
            prev_lower = false;
            continue;
        }
        if c.is_ascii_uppercase() && prev_lower && !current.is_empty() {
            words.push(current.clone());
            current.clear();
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

pub fn to_snake(name: &str) -> String {
    split_words(name)
        .iter()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

pub fn to_pascal(name: &str) -> String {
    split_words(name).iter().map(|w| capitalize(w)).collect()
}

pub fn to_camel(name: &str) -> String {
    let pascal = to_pascal(name);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => pascal,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
        }
        None => String::new(),
    }
}
