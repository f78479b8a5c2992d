//! Invocation parsing: `/name positional key=value "quoted arg"`.

use indexmap::IndexMap;

use crate::spec::is_identifier;

/// A tokenized command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// First token, without a leading `/`.
    pub command: String,
    /// `key=value` tokens, in order of first appearance. A repeated key keeps
    /// its last value.
    pub named: IndexMap<String, String>,
    /// Remaining tokens in order.
    pub positional: Vec<String>,
}

/// Parse `input` into an invocation. Returns `None` for blank input.
///
/// Double and single quotes group whitespace; a backslash escapes the next
/// character. An unterminated quote runs to the end of the input and a
/// trailing backslash is kept literally.
pub fn parse_invocation(input: &str) -> Option<Invocation> {
    let mut tokens = tokenize(input).into_iter();
    let first = tokens.next()?;
    let command = first.strip_prefix('/').unwrap_or(&first).to_string();

    let mut invocation = Invocation {
        command,
        ..Default::default()
    };
    for token in tokens {
        match split_key_value(&token) {
            Some((key, value)) => {
                invocation.named.insert(key.to_string(), value.to_string());
            }
            None => invocation.positional.push(token),
        }
    }
    Some(invocation)
}

/// The first whitespace-delimited token of `input`, without a leading `/`.
pub fn first_token(input: &str) -> Option<&str> {
    let token = input.split_whitespace().next()?;
    let token = token.strip_prefix('/').unwrap_or(token);
    (!token.is_empty()).then_some(token)
}

fn split_key_value(token: &str) -> Option<(&str, &str)> {
    let (key, value) = token.split_once('=')?;
    is_identifier(key).then_some((key, value))
}

fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match (ch, quote) {
            ('\\', _) => {
                current.push(chars.next().unwrap_or('\\'));
                in_token = true;
            }
            (c, Some(q)) if c == q => quote = None,
            (_, Some(_)) => current.push(ch),
            ('"' | '\'', None) => {
                quote = Some(ch);
                in_token = true;
            }
            (c, None) if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            _ => {
                current.push(ch);
                in_token = true;
            }
        }
    }

    if in_token {
        tokens.push(current);
    }
    tokens
}
