/*!
Replacement templates for substitution.

A replacement string like `"\1-\g<name>"` is parsed once into a
[`Template`], a list of literal runs and group references, so that callers
substituting over many matches do not re-parse it every time.
*/

use crate::compiler::{Error, Pattern};

/// One piece of a parsed replacement template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    /// Verbatim text.
    Literal(String),
    /// The text of a capture group, by id.
    Group(usize),
}

/// A parsed replacement template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    parts: Vec<TemplatePart>,
}

impl Template {
    /// Parses a replacement string against `pattern`, which supplies the
    /// group count and the named groups.
    ///
    /// `\0` to `\9` reference groups by number, `\g<name>` by name (a
    /// numeric name is a number reference). The usual character escapes
    /// are recognized; any other escape is an error.
    pub fn parse(repl: &str, pattern: &Pattern) -> Result<Self, Error> {
        let chars: Vec<char> = repl.chars().collect();
        let mut parts: Vec<TemplatePart> = Vec::new();
        let mut literal = String::new();
        let mut pos = 0;

        let mut flush =
            |literal: &mut String, parts: &mut Vec<TemplatePart>| {
                if !literal.is_empty() {
                    parts.push(TemplatePart::Literal(std::mem::take(literal)));
                }
            };

        while let Some(&c) = chars.get(pos) {
            pos += 1;
            if c != '\\' {
                literal.push(c);
                continue;
            }
            let escape = *chars.get(pos).ok_or_else(|| {
                Error::bad_escape("replacement ends with a bare backslash")
            })?;
            pos += 1;
            match escape {
                '0'..='9' => {
                    let group = escape.to_digit(10).unwrap() as usize;
                    if group > pattern.group_count() {
                        return Err(Error::bad_group_name(format!(
                            "invalid group reference {}",
                            group
                        )));
                    }
                    flush(&mut literal, &mut parts);
                    parts.push(TemplatePart::Group(group));
                }
                'g' => {
                    if chars.get(pos) != Some(&'<') {
                        return Err(Error::bad_group_name(
                            "expected `<` after `\\g`",
                        ));
                    }
                    pos += 1;
                    let mut name = String::new();
                    loop {
                        match chars.get(pos) {
                            None => {
                                return Err(Error::bad_group_name(
                                    "missing `>` after group name",
                                ))
                            }
                            Some('>') => {
                                pos += 1;
                                break;
                            }
                            Some(&c) => {
                                name.push(c);
                                pos += 1;
                            }
                        }
                    }
                    let group = if name.chars().all(|c| c.is_ascii_digit())
                        && !name.is_empty()
                    {
                        name.parse::<usize>().map_err(|_| {
                            Error::bad_group_name(format!(
                                "invalid group reference {}",
                                name
                            ))
                        })?
                    } else {
                        pattern.group_index(&name).ok_or_else(|| {
                            Error::bad_group_name(format!(
                                "unknown group name `{}`",
                                name
                            ))
                        })?
                    };
                    if group > pattern.group_count() {
                        return Err(Error::bad_group_name(format!(
                            "invalid group reference {}",
                            group
                        )));
                    }
                    flush(&mut literal, &mut parts);
                    parts.push(TemplatePart::Group(group));
                }
                'n' => literal.push('\n'),
                'r' => literal.push('\r'),
                't' => literal.push('\t'),
                'f' => literal.push('\x0c'),
                'v' => literal.push('\x0b'),
                'a' => literal.push('\x07'),
                '\\' => literal.push('\\'),
                c => {
                    return Err(Error::bad_escape(format!(
                        "bad escape `\\{}` in replacement",
                        c
                    )))
                }
            }
        }
        flush(&mut literal, &mut parts);
        Ok(Self { parts })
    }

    /// The parsed pieces, in order.
    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    /// Renders the template against a match. Groups that did not
    /// participate in the match expand to the empty string.
    pub fn expand(&self, m: &crate::Match) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Literal(text) => out.push_str(text),
                TemplatePart::Group(group) => {
                    if let Some(text) = m.group(*group) {
                        out.push_str(text);
                    }
                }
            }
        }
        out
    }
}
