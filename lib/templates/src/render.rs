//! Text templates with `{{ output }}` and `{% if %}` blocks.
//!
//! ```text
//! {% if formal_address %}Wie geht es Ihnen?{% else %}Wie geht's dir?{% endif %}
//! Frage {{ question.title | bold }}
//! ```
//!
//! Output expressions accept `| filter` chains. Interpolated values are
//! inserted as plain text and never parsed again, so markup inside a
//! variable (a question title, a user's answer) must be rendered before it
//! is handed to a template.

use crate::error::{ExpressionError, TemplateError};
use crate::expression::{Expr, Scope};
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// Output filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// `*text*` with Markdown escaping.
    Bold,
    /// `_text_` with Markdown escaping.
    Italic,
    /// `` `text` `` with Markdown escaping.
    Code,
    /// Markdown escaping only.
    Escape,
    /// All upper case.
    Upper,
    /// All lower case.
    Lower,
    /// First letter upper case.
    Capitalize,
    /// Surrounding whitespace removed.
    Trim,
}

impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bold" => Ok(Self::Bold),
            "italic" => Ok(Self::Italic),
            "code" => Ok(Self::Code),
            "escape" => Ok(Self::Escape),
            "upper" => Ok(Self::Upper),
            "lower" => Ok(Self::Lower),
            "capitalize" => Ok(Self::Capitalize),
            "trim" => Ok(Self::Trim),
            other => Err(format!("unknown filter '{other}'")),
        }
    }
}

impl Filter {
    /// Applies the filter.
    #[must_use]
    pub fn apply(self, text: &str) -> String {
        match self {
            Self::Bold => format!("*{}*", escape_markdown(text)),
            Self::Italic => format!("_{}_", escape_markdown(text)),
            Self::Code => format!("`{}`", escape_markdown(text)),
            Self::Escape => escape_markdown(text),
            Self::Upper => text.to_uppercase(),
            Self::Lower => text.to_lowercase(),
            Self::Capitalize => capitalize(text),
            Self::Trim => text.trim().to_string(),
        }
    }
}

/// Escapes the characters Telegram-flavoured Markdown treats as markup.
#[must_use]
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Upper-cases the first character.
#[must_use]
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lower-cases the first character.
#[must_use]
pub fn decapitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// How a value appears in rendered text.
#[must_use]
pub fn to_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Output { expr: Expr, filters: Vec<Filter> },
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
}

enum Segment<'a> {
    Text(&'a str),
    Output(&'a str),
    Tag(&'a str),
}

/// A parsed text template.
#[derive(Debug, Clone)]
pub struct TextTemplate {
    source: String,
    nodes: Vec<Node>,
}

impl TextTemplate {
    /// Parses template markup.
    ///
    /// # Errors
    ///
    /// Returns `Syntax` for unclosed delimiters, unbalanced blocks, unknown
    /// filters and malformed expressions.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let syntax = |reason: String| TemplateError::Syntax {
            template: source.to_string(),
            reason,
        };
        let segments = segment(source).map_err(syntax)?;
        let mut index = 0;
        let (nodes, terminator) = parse_nodes(&segments, &mut index, &[]).map_err(syntax)?;
        debug_assert!(terminator.is_none());
        Ok(Self {
            source: source.to_string(),
            nodes,
        })
    }

    /// The original markup.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders one pass.
    ///
    /// # Errors
    ///
    /// Returns `Render` when an expression fails to evaluate.
    pub fn render(&self, scope: &dyn Scope) -> Result<String, TemplateError> {
        let mut out = String::new();
        render_nodes(&self.nodes, scope, &mut out).map_err(|error| TemplateError::Render {
            template: self.source.clone(),
            error,
        })?;
        Ok(out)
    }

    /// Renders and trims surrounding whitespace.
    ///
    /// # Errors
    ///
    /// As [`render`](Self::render).
    pub fn render_trimmed(&self, scope: &dyn Scope) -> Result<String, TemplateError> {
        Ok(self.render(scope)?.trim().to_string())
    }
}

/// Parses and renders a one-off template string.
///
/// # Errors
///
/// As [`TextTemplate::parse`] and [`TextTemplate::render`].
pub fn render_str(source: &str, scope: &dyn Scope) -> Result<String, TemplateError> {
    TextTemplate::parse(source)?.render_trimmed(scope)
}

fn segment(source: &str) -> Result<Vec<Segment<'_>>, String> {
    let mut segments = Vec::new();
    let mut rest = source;
    while let Some(start) = rest.find('{') {
        let tail = &rest[start..];
        let (close, is_tag) = if tail.starts_with("{{") {
            ("}}", false)
        } else if tail.starts_with("{%") {
            ("%}", true)
        } else {
            let literal = &rest[..=start];
            segments.push(Segment::Text(literal));
            rest = &rest[start + 1..];
            continue;
        };
        if start > 0 {
            segments.push(Segment::Text(&rest[..start]));
        }
        let body = &tail[2..];
        let end = body
            .find(close)
            .ok_or_else(|| format!("missing '{close}'"))?;
        let inner = body[..end].trim_matches('-').trim();
        segments.push(if is_tag {
            Segment::Tag(inner)
        } else {
            Segment::Output(inner)
        });
        rest = &body[end + 2..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    Ok(segments)
}

fn expression(source: &str) -> Result<Expr, String> {
    Expr::parse(source).map_err(|e| format!("in '{source}': {e}"))
}

fn parse_nodes(
    segments: &[Segment<'_>],
    index: &mut usize,
    terminators: &[&str],
) -> Result<(Vec<Node>, Option<String>), String> {
    let mut nodes = Vec::new();
    while let Some(segment) = segments.get(*index) {
        *index += 1;
        match segment {
            Segment::Text(text) => nodes.push(Node::Text((*text).to_string())),
            Segment::Output(inner) => {
                let (expr, names) = Expr::parse_with_filters(inner)
                    .map_err(|e| format!("in '{inner}': {e}"))?;
                let filters = names
                    .iter()
                    .map(|name| name.parse::<Filter>())
                    .collect::<Result<Vec<_>, _>>()?;
                nodes.push(Node::Output { expr, filters });
            }
            Segment::Tag(inner) => {
                let keyword = inner.split_whitespace().next().unwrap_or_default();
                if terminators.contains(&keyword) {
                    return Ok((nodes, Some((*inner).to_string())));
                }
                match keyword {
                    "if" => nodes.push(parse_if(segments, index, &inner[2..])?),
                    other => return Err(format!("unexpected tag '{other}'")),
                }
            }
        }
    }
    if terminators.is_empty() {
        Ok((nodes, None))
    } else {
        Err("missing '{% endif %}'".to_string())
    }
}

fn parse_if(segments: &[Segment<'_>], index: &mut usize, condition: &str) -> Result<Node, String> {
    let mut branches = Vec::new();
    let mut condition = expression(condition.trim())?;
    loop {
        let (body, terminator) = parse_nodes(segments, index, &["elif", "else", "endif"])?;
        let terminator = terminator.unwrap_or_default();
        branches.push((condition, body));
        match terminator.split_whitespace().next() {
            Some("elif") => condition = expression(terminator[4..].trim())?,
            Some("else") => {
                let (otherwise, end) = parse_nodes(segments, index, &["endif"])?;
                debug_assert!(end.is_some());
                return Ok(Node::If {
                    branches,
                    otherwise,
                });
            }
            _ => {
                return Ok(Node::If {
                    branches,
                    otherwise: Vec::new(),
                });
            }
        }
    }
}

fn render_nodes(nodes: &[Node], scope: &dyn Scope, out: &mut String) -> Result<(), ExpressionError> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Output { expr, filters } => {
                let value = expr.eval(scope)?;
                let text = filters
                    .iter()
                    .fold(to_text(&value), |text, filter| filter.apply(&text));
                out.push_str(&text);
            }
            Node::If {
                branches,
                otherwise,
            } => {
                let mut taken = None;
                for (condition, body) in branches {
                    if condition.is_satisfied(scope)? {
                        taken = Some(body);
                        break;
                    }
                }
                render_nodes(taken.unwrap_or(otherwise), scope, out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn scope() -> BTreeMap<String, JsonValue> {
        let mut vars = BTreeMap::new();
        vars.insert("formal".to_string(), json!(true));
        vars.insert("name".to_string(), json!("ada_lovelace"));
        vars.insert("count".to_string(), json!(2));
        vars.insert(
            "question".to_string(),
            json!({"title": "Wie heißt {{ 'dein' | capitalize }} Handy?"}),
        );
        vars.insert("answer".to_string(), json!("Ist mir {{ runtergefallen"));
        vars.insert("tagged".to_string(), json!("{% if formal %}ja{% endif %} {{ formal }}"));
        vars
    }

    fn render(source: &str) -> String {
        render_str(source, &scope()).unwrap_or_else(|e| panic!("{source}: {e}"))
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(render("Hallo!"), "Hallo!");
        assert_eq!(render("a {b} c"), "a {b} c");
    }

    #[test]
    fn outputs_and_filters() {
        assert_eq!(render("Hi {{ name }}"), "Hi ada_lovelace");
        assert_eq!(render("{{ name | bold }}"), "*ada\\_lovelace*");
        assert_eq!(render("{{ name | upper }}"), "ADA_LOVELACE");
        assert_eq!(render("{{ count + 1 }} Fragen"), "3 Fragen");
        assert_eq!(render("{{ question.missing }}x"), "x");
    }

    #[test]
    fn if_elif_else() {
        let source = "{% if count > 5 %}viele{% elif count > 1 %}einige{% else %}wenige{% endif %}";
        assert_eq!(render(source), "einige");
        assert_eq!(render("{% if formal %}Sie{% else %}du{% endif %}"), "Sie");
        assert_eq!(render("{% if not formal %}du{% endif %}!"), "!");
    }

    #[test]
    fn nested_blocks() {
        let source = "{% if formal %}{% if count == 2 %}zwei{% endif %}{% endif %}";
        assert_eq!(render(source), "zwei");
    }

    #[test]
    fn interpolated_markup_stays_text() {
        assert_eq!(
            render("Frage: {{ question.title }}"),
            "Frage: Wie heißt {{ 'dein' | capitalize }} Handy?"
        );
        assert_eq!(render("Antwort: {{ answer }}"), "Antwort: Ist mir {{ runtergefallen");
        assert_eq!(render("{{ tagged }}"), "{% if formal %}ja{% endif %} {{ formal }}");
    }

    #[test]
    fn whitespace_is_trimmed() {
        assert_eq!(render("  Hallo \n"), "Hallo");
    }

    #[test]
    fn malformed_templates_are_rejected() {
        for source in ["{{ name", "{% if formal %}x", "{% endif %}", "{{ name | shout }}", "{% for x in y %}{% endfor %}"] {
            assert!(
                matches!(TextTemplate::parse(source), Err(TemplateError::Syntax { .. })),
                "{source} should not parse"
            );
        }
    }

    #[test]
    fn unknown_variables_fail_rendering() {
        let err = render_str("{{ nope }}", &scope()).expect_err("unknown");
        assert!(matches!(
            err,
            TemplateError::Render {
                error: ExpressionError::UnknownVariable { .. },
                ..
            }
        ));
    }

    #[test]
    fn escaping_and_capitalization_helpers() {
        assert_eq!(escape_markdown("a_b*c`d[e"), "a\\_b\\*c\\`d\\[e");
        assert_eq!(capitalize("über"), "Über");
        assert_eq!(decapitalize("Aber"), "aber");
        assert_eq!(capitalize(""), "");
    }
}
