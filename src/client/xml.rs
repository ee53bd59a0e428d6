//! Small XML helpers shared by the family clients
//!
//! Responses are read with the `quick-xml` event reader. Request bodies are
//! built by hand with [`escape_into`].

use crate::error::Result;
use quick_xml::events::Event;
use quick_xml::Reader;

/// Escape XML special characters into an existing buffer
pub fn escape_into(buf: &mut String, s: &str) {
    for ch in s.chars() {
        match ch {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '"' => buf.push_str("&quot;"),
            '\'' => buf.push_str("&apos;"),
            _ => buf.push(ch),
        }
    }
}

/// Append `<tag>value</tag>` with the value escaped
pub fn push_element(buf: &mut String, tag: &str, value: &str) {
    buf.push('<');
    buf.push_str(tag);
    buf.push('>');
    escape_into(buf, value);
    buf.push_str("</");
    buf.push_str(tag);
    buf.push('>');
}

/// Collect the text of every element whose ancestry ends with `path`.
///
/// `&["Bucket", "Name"]` matches `<Name>` directly inside any `<Bucket>`,
/// wherever that sits in the document. Matches are returned in document order;
/// empty elements yield an empty string.
pub fn texts_at(xml: &[u8], path: &[&str]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text_start = true;
    reader.config_mut().trim_text_end = true;

    let mut stack: Vec<Vec<u8>> = Vec::with_capacity(8);
    let mut current_text = String::new();
    let mut found = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                stack.push(e.local_name().as_ref().to_vec());
                current_text.clear();
            }
            Event::Empty(e) => {
                stack.push(e.local_name().as_ref().to_vec());
                if stack_ends_with(&stack, path) {
                    found.push(String::new());
                }
                stack.pop();
            }
            Event::Text(e) => {
                current_text.clear();
                current_text.push_str(&e.unescape()?);
            }
            Event::CData(e) => {
                current_text.clear();
                current_text.push_str(&String::from_utf8_lossy(&e));
            }
            Event::End(_) => {
                if stack_ends_with(&stack, path) {
                    found.push(std::mem::take(&mut current_text));
                }
                current_text.clear();
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(found)
}

/// First match of [`texts_at`]
pub fn first_text_at(xml: &[u8], path: &[&str]) -> Result<Option<String>> {
    Ok(texts_at(xml, path)?.into_iter().next())
}

fn stack_ends_with(stack: &[Vec<u8>], path: &[&str]) -> bool {
    if path.len() > stack.len() {
        return false;
    }
    stack[stack.len() - path.len()..]
        .iter()
        .zip(path)
        .all(|(have, want)| have.as_slice() == want.as_bytes())
}

/// Extract `(code, message)` from a provider error document.
///
/// Handles the storage shape (`<Error><Code>`), the compute shape
/// (`<Response><Errors><Error><Code>`) and the warehouse shape
/// (`<ErrorResponse><Error><Code>`).
pub fn parse_error(xml: &[u8]) -> Option<(String, String)> {
    let code = first_text_at(xml, &["Error", "Code"]).ok().flatten()?;
    let message = first_text_at(xml, &["Error", "Message"])
        .ok()
        .flatten()
        .unwrap_or_default();
    Some((code, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        let mut buf = String::new();
        escape_into(&mut buf, "a<b>&\"c'");
        assert_eq!(buf, "a&lt;b&gt;&amp;&quot;c&apos;");
    }

    #[test]
    fn test_push_element() {
        let mut buf = String::new();
        push_element(&mut buf, "Key", "a&b.txt");
        assert_eq!(buf, "<Key>a&amp;b.txt</Key>");
    }

    #[test]
    fn test_texts_at_matches_path_suffix() {
        let xml = br#"<?xml version="1.0"?>
<ListAllMyBucketsResult>
  <Owner><ID>abc</ID><DisplayName>me</DisplayName></Owner>
  <Buckets>
    <Bucket><Name>alpha</Name><CreationDate>2024-01-01T00:00:00Z</CreationDate></Bucket>
    <Bucket><Name>beta</Name><CreationDate>2024-01-02T00:00:00Z</CreationDate></Bucket>
  </Buckets>
</ListAllMyBucketsResult>"#;

        let names = texts_at(xml, &["Bucket", "Name"]).unwrap();
        assert_eq!(names, vec!["alpha", "beta"]);

        let owner = first_text_at(xml, &["Owner", "ID"]).unwrap();
        assert_eq!(owner.as_deref(), Some("abc"));
    }

    #[test]
    fn test_texts_at_nested_state_name() {
        let xml = br#"<DescribeInstancesResponse>
  <reservationSet><item><instancesSet><item>
    <instanceId>i-123</instanceId>
    <instanceState><code>16</code><name>running</name></instanceState>
    <tagSet><item><key>Name</key><value>web</value></item></tagSet>
  </item></instancesSet></item></reservationSet>
</DescribeInstancesResponse>"#;

        let state = first_text_at(xml, &["instanceState", "name"]).unwrap();
        assert_eq!(state.as_deref(), Some("running"));
        let tags = texts_at(xml, &["tagSet", "item", "value"]).unwrap();
        assert_eq!(tags, vec!["web"]);
    }

    #[test]
    fn test_parse_error_shapes() {
        let s3 = b"<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>";
        assert_eq!(
            parse_error(s3),
            Some(("NoSuchKey".into(), "The specified key does not exist.".into()))
        );

        let ec2 = b"<Response><Errors><Error><Code>InvalidInstanceID.NotFound</Code><Message>nope</Message></Error></Errors><RequestID>x</RequestID></Response>";
        assert_eq!(parse_error(ec2).unwrap().0, "InvalidInstanceID.NotFound");

        let redshift = b"<ErrorResponse><Error><Type>Sender</Type><Code>ClusterNotFound</Code><Message>missing</Message></Error></ErrorResponse>";
        assert_eq!(parse_error(redshift).unwrap().0, "ClusterNotFound");

        assert_eq!(parse_error(b"not xml at all"), None);
    }
}
