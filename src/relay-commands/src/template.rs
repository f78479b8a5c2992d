//! Prompt template expansion.
//!
//! Supported syntax:
//!
//! - `{{name}}` is replaced with the resolved value of `name` (empty when
//!   unresolved). Whitespace inside the braces is ignored.
//! - `{{#if name}} ... {{else}} ... {{/if}}` keeps the first body when `name`
//!   resolves to a non-empty value and the optional `{{else}}` body otherwise.
//!   Conditional blocks do not nest.
//! - A `{{` without a closing `}}` is literal text, as is any other block
//!   helper such as `{{#each files}}`.
//!
//! Besides arguments, a template may reference the context variables
//! `git_diff`, `files`, `workspace_root` and `env.<NAME>` when the caller
//! supplies them.

use indexmap::IndexMap;
use thiserror::Error;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// A structural problem in a template. Offsets are byte offsets of the
/// offending tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("nested '{{{{#if {name}}}}}' at byte {offset}; conditional blocks cannot nest")]
    NestedConditional { name: String, offset: usize },

    #[error("'{{{{#if {name}}}}}' opened at byte {offset} is never closed")]
    UnclosedConditional { name: String, offset: usize },

    #[error("'{{{{/if}}}}' at byte {offset} has no matching '{{{{#if}}}}'")]
    UnexpectedClose { offset: usize },

    #[error("'{{{{else}}}}' at byte {offset} is outside a conditional block")]
    UnexpectedElse { offset: usize },

    #[error("'{{{{#if}}}}' at byte {offset} names no argument")]
    MissingCondition { offset: usize },

    #[error("'{{{{#if {condition}}}}}' at byte {offset} must name exactly one argument")]
    InvalidCondition { condition: String, offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Inline<'a> {
    Text(&'a str),
    Var(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node<'a> {
    Inline(Inline<'a>),
    Conditional {
        name: &'a str,
        then: Vec<Inline<'a>>,
        otherwise: Vec<Inline<'a>>,
    },
}

enum Tag<'a> {
    If(&'a str),
    Else,
    EndIf,
    Var(&'a str),
    Literal,
}

fn classify(inner: &str) -> Tag<'_> {
    let tag = inner.trim();
    if let Some(rest) = tag.strip_prefix("#if")
        && (rest.is_empty() || rest.starts_with(char::is_whitespace))
    {
        return Tag::If(rest.trim());
    }
    match tag {
        "else" => Tag::Else,
        "/if" => Tag::EndIf,
        "" => Tag::Literal,
        t if t.starts_with('#') || t.starts_with('/') => Tag::Literal,
        t => Tag::Var(t),
    }
}

/// A parsed template, borrowing from its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template<'a> {
    nodes: Vec<Node<'a>>,
}

struct OpenBlock<'a> {
    name: &'a str,
    offset: usize,
    then: Vec<Inline<'a>>,
    otherwise: Option<Vec<Inline<'a>>>,
}

impl<'a> Template<'a> {
    /// Parse `source`, rejecting malformed conditional blocks.
    pub fn parse(source: &'a str) -> Result<Self, TemplateError> {
        let mut nodes = Vec::new();
        let mut block: Option<OpenBlock<'a>> = None;
        let mut pos = 0;

        while pos < source.len() {
            let Some(start) = source[pos..].find(OPEN).map(|i| pos + i) else {
                push_inline(&mut nodes, &mut block, Inline::Text(&source[pos..]));
                break;
            };
            let Some(end) = source[start + OPEN.len()..]
                .find(CLOSE)
                .map(|i| start + OPEN.len() + i)
            else {
                push_inline(&mut nodes, &mut block, Inline::Text(&source[pos..]));
                break;
            };

            if start > pos {
                push_inline(&mut nodes, &mut block, Inline::Text(&source[pos..start]));
            }
            let tag_end = end + CLOSE.len();

            match classify(&source[start + OPEN.len()..end]) {
                Tag::If("") => return Err(TemplateError::MissingCondition { offset: start }),
                Tag::If(condition) if condition.contains(char::is_whitespace) => {
                    return Err(TemplateError::InvalidCondition {
                        condition: condition.to_string(),
                        offset: start,
                    });
                }
                Tag::If(name) => {
                    if block.is_some() {
                        return Err(TemplateError::NestedConditional {
                            name: name.to_string(),
                            offset: start,
                        });
                    }
                    block = Some(OpenBlock {
                        name,
                        offset: start,
                        then: Vec::new(),
                        otherwise: None,
                    });
                }
                Tag::Else => match block.as_mut() {
                    Some(open) if open.otherwise.is_none() => open.otherwise = Some(Vec::new()),
                    _ => return Err(TemplateError::UnexpectedElse { offset: start }),
                },
                Tag::EndIf => match block.take() {
                    Some(open) => nodes.push(Node::Conditional {
                        name: open.name,
                        then: open.then,
                        otherwise: open.otherwise.unwrap_or_default(),
                    }),
                    None => return Err(TemplateError::UnexpectedClose { offset: start }),
                },
                Tag::Var(name) => push_inline(&mut nodes, &mut block, Inline::Var(name)),
                Tag::Literal => {
                    push_inline(&mut nodes, &mut block, Inline::Text(&source[start..tag_end]))
                }
            }

            pos = tag_end;
        }

        if let Some(open) = block {
            return Err(TemplateError::UnclosedConditional {
                name: open.name.to_string(),
                offset: open.offset,
            });
        }

        Ok(Self { nodes })
    }

    /// Expand the template. `values` holds resolved argument values; a name
    /// with no entry renders as empty.
    pub fn render(&self, values: &IndexMap<String, String>) -> String {
        let lookup = |name: &str| values.get(name).map(String::as_str).unwrap_or("");
        let mut out = String::new();

        for node in &self.nodes {
            let body = match node {
                Node::Inline(inline) => std::slice::from_ref(inline),
                Node::Conditional {
                    name,
                    then,
                    otherwise,
                } => {
                    if lookup(*name).is_empty() {
                        otherwise.as_slice()
                    } else {
                        then.as_slice()
                    }
                }
            };
            for inline in body {
                match inline {
                    Inline::Text(text) => out.push_str(text),
                    Inline::Var(name) => out.push_str(lookup(*name)),
                }
            }
        }

        out
    }

    /// Distinct names referenced by placeholders and conditions, in
    /// first-use order.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();

        for node in &self.nodes {
            let (condition, body) = match node {
                Node::Inline(inline) => (None, vec![inline]),
                Node::Conditional {
                    name,
                    then,
                    otherwise,
                } => (Some(*name), then.iter().chain(otherwise).collect()),
            };
            let referenced = condition.into_iter().chain(body.into_iter().filter_map(|inline| {
                match inline {
                    Inline::Var(name) => Some(*name),
                    Inline::Text(_) => None,
                }
            }));
            for name in referenced {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }

        names
    }
}

fn push_inline<'a>(nodes: &mut Vec<Node<'a>>, block: &mut Option<OpenBlock<'a>>, inline: Inline<'a>) {
    match block {
        Some(OpenBlock {
            otherwise: Some(otherwise),
            ..
        }) => otherwise.push(inline),
        Some(open) => open.then.push(inline),
        None => nodes.push(Node::Inline(inline)),
    }
}

/// Parse and expand `source` in one step.
pub fn render_str(source: &str, values: &IndexMap<String, String>) -> Result<String, TemplateError> {
    Ok(Template::parse(source)?.render(values))
}

/// Names referenced by `source`; empty when the template is malformed.
pub fn placeholders(source: &str) -> Vec<String> {
    Template::parse(source)
        .map(|template| template.placeholders())
        .unwrap_or_default()
}
