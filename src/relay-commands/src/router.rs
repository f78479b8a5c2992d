//! Activation routing: pick a command for free-text input.
//!
//! Every spec with activation hints is scored against the input. A hint
//! contributes its character length when its lowercase form occurs anywhere
//! in the lowercase input. The highest score wins; ties go to the spec with
//! the longest single matching hint, then to the earliest registered spec.

use std::cmp::Ordering;

use serde::Serialize;

use crate::registry::CommandRegistry;
use crate::spec::CommandSpec;

/// A routing candidate.
#[derive(Debug, Clone, Serialize)]
pub struct RouteMatch<'a> {
    #[serde(rename = "name", serialize_with = "serialize_spec_name")]
    pub spec: &'a CommandSpec,
    pub score: usize,
    /// Character length of the longest matching hint.
    pub longest_hint: usize,
    #[serde(skip)]
    position: usize,
}

fn serialize_spec_name<S: serde::Serializer>(
    spec: &&CommandSpec,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&spec.name)
}

impl RouteMatch<'_> {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    fn precedence(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then(other.longest_hint.cmp(&self.longest_hint))
            .then(self.position.cmp(&other.position))
    }
}

/// Score `spec` against already-lowercased input.
///
/// Returns `(score, longest_hint)`, both zero when nothing matches.
pub fn score(spec: &CommandSpec, input_lower: &str) -> (usize, usize) {
    spec.activation_hints
        .iter()
        .filter(|hint| !hint.trim().is_empty())
        .filter(|hint| input_lower.contains(&hint.to_lowercase()))
        .map(|hint| hint.chars().count())
        .fold((0, 0), |(total, longest), len| {
            (total + len, longest.max(len))
        })
}

/// Every spec that scores above zero, best first.
pub fn rank<'a>(input: &str, registry: &'a CommandRegistry) -> Vec<RouteMatch<'a>> {
    let input_lower = input.to_lowercase();

    let mut matches: Vec<RouteMatch<'a>> = registry
        .iter()
        .enumerate()
        .filter_map(|(position, spec)| {
            let (score, longest_hint) = score(spec, &input_lower);
            (score > 0).then_some(RouteMatch {
                spec,
                score,
                longest_hint,
                position,
            })
        })
        .collect();

    matches.sort_by(RouteMatch::precedence);
    matches
}

/// The best match for `input`, if any spec scores above zero.
pub fn route<'a>(input: &str, registry: &'a CommandRegistry) -> Option<&'a CommandSpec> {
    best(input, registry).map(|m| m.spec)
}

/// Like [`route`] but keeps the score.
pub fn best<'a>(input: &str, registry: &'a CommandRegistry) -> Option<RouteMatch<'a>> {
    rank(input, registry).into_iter().next()
}
