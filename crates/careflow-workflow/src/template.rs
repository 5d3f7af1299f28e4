use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::DispatchError;
use crate::types::{Payload, payload_value};

/// Text template using `{field}` placeholders resolved from an event payload.
///
/// `{{` and `}}` produce literal braces. A placeholder whose field is missing
/// from the payload fails the render instead of rendering blank.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if chars.peek().is_some_and(|&(_, n)| n == '{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, n) in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(format!("unclosed '{{' at offset {pos}"));
                    }
                    if !is_field_name(&name) {
                        return Err(format!("invalid placeholder '{{{name}}}'"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' if chars.peek().is_some_and(|&(_, n)| n == '}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(format!("unmatched '}}' at offset {pos}")),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, payload: &Payload) -> Result<String, DispatchError> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = payload_value(payload, name)
                        .ok_or_else(|| DispatchError::MissingTemplateKey(name.clone()))?;
                    out.push_str(&render_value(value));
                }
            }
        }
        Ok(out)
    }
}

impl Serialize for Template {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

fn is_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_render_template() {
        let t = Template::parse("Automated follow-up for {risk_level} risk score {risk_score}.")
            .unwrap();
        let rendered = t
            .render(&payload(json!({"risk_level": "Critical", "risk_score": 0.87})))
            .unwrap();
        assert_eq!(rendered, "Automated follow-up for Critical risk score 0.87.");
    }

    #[test]
    fn test_render_scalars() {
        let t = Template::parse("{patient_id}/{taken}/{codes}").unwrap();
        let rendered = t
            .render(&payload(json!({
                "patient_id": 42,
                "taken": false,
                "codes": ["a", 1]
            })))
            .unwrap();
        assert_eq!(rendered, "42/false/[\"a\",1]");
    }

    #[test]
    fn test_missing_placeholder_fails() {
        let t = Template::parse("Follow-up for {risk_level}").unwrap();
        let err = t.render(&Payload::new()).unwrap_err();
        assert_eq!(err, DispatchError::MissingTemplateKey("risk_level".into()));
    }

    #[test]
    fn test_null_placeholder_counts_as_missing() {
        let t = Template::parse("Alert {alert_id}").unwrap();
        let err = t.render(&payload(json!({"alert_id": null}))).unwrap_err();
        assert_eq!(err, DispatchError::MissingTemplateKey("alert_id".into()));
    }

    #[test]
    fn test_escaped_braces() {
        let t = Template::parse("{{literal}} {value}").unwrap();
        assert_eq!(t.placeholders().collect::<Vec<_>>(), vec!["value"]);
        assert_eq!(
            t.render(&payload(json!({"value": 1}))).unwrap(),
            "{literal} 1"
        );
    }

    #[test]
    fn test_plain_text() {
        let t = Template::parse("Auto-created from domain event.").unwrap();
        assert_eq!(t.placeholders().count(), 0);
        assert_eq!(t.render(&Payload::new()).unwrap(), "Auto-created from domain event.");
    }

    #[test]
    fn test_rejects_malformed_templates() {
        assert!(Template::parse("open {risk_level").is_err());
        assert!(Template::parse("stray } brace").is_err());
        assert!(Template::parse("{}").is_err());
        assert!(Template::parse("{risk_score:.2f}").is_err());
        assert!(Template::parse("{patient.name}").is_err());
    }
}
