//! Tag sets in the `x-amz-tagging` query-string form: `k=v&k=v`.
//!
//! Keys and values are encoded as URL query components. Unreserved
//! characters pass through, a space becomes `+`, every other byte is `%XX`.

use crate::{errors::ParseError, models::tagging::Tag};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn encode_component(value: &str) -> String {
    value
        .split(' ')
        .map(|part| utf8_percent_encode(part, QUERY_COMPONENT).to_string())
        .collect::<Vec<_>>()
        .join("+")
}

fn decode_component(value: &str) -> Result<String, ParseError> {
    percent_decode_str(&value.replace('+', " "))
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ParseError::InvalidTagging(value.to_string()))
}

/// Encode tags in input order. An empty tag list gives an empty string.
pub fn tagging_string(tags: &[Tag]) -> String {
    tags.iter()
        .map(|tag| {
            format!(
                "{}={}",
                encode_component(&tag.key),
                encode_component(&tag.value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Like [`tagging_string`], but `None` when there is nothing to send.
pub fn tagging_field(tags: &[Tag]) -> Option<String> {
    let value = tagging_string(tags);
    (!value.is_empty()).then_some(value)
}

/// Decode a tagging header. A pair without `=` is a tag with an empty value.
pub fn parse_tagging_string(tagging: &str) -> Result<Vec<Tag>, ParseError> {
    tagging
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Ok(Tag::new(decode_component(key)?, decode_component(value)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_in_input_order() {
        let tags = vec![Tag::new("env", "test"), Tag::new("purpose", "e2e-test")];
        assert_eq!(tagging_string(&tags), "env=test&purpose=e2e-test");
    }

    #[test]
    fn empty_list_is_omitted() {
        assert_eq!(tagging_string(&[]), "");
        assert_eq!(tagging_field(&[]), None);
    }

    #[test]
    fn escapes_like_a_query_component() {
        let tags = vec![
            Tag::new("project name", "a+b"),
            Tag::new("path", "x/y?z=1&w"),
            Tag::new("safe", "A-z_0.9~"),
        ];
        assert_eq!(
            tagging_string(&tags),
            "project+name=a%2Bb&path=x%2Fy%3Fz%3D1%26w&safe=A-z_0.9~"
        );
    }

    #[test]
    fn unicode_round_trips() {
        let tags = vec![
            Tag::new("言語", "日本語"),
            Tag::new("emoji", "🚀 launch"),
            Tag::new("empty", ""),
        ];
        let encoded = tagging_string(&tags);
        assert!(encoded.starts_with("%E8%A8%80%E8%AA%9E=%E6%97%A5%E6%9C%AC%E8%AA%9E&"));
        assert_eq!(parse_tagging_string(&encoded), Ok(tags));
    }

    #[test]
    fn parse_rejects_invalid_utf8() {
        assert!(matches!(
            parse_tagging_string("k=%FF"),
            Err(ParseError::InvalidTagging(_))
        ));
        assert_eq!(parse_tagging_string(""), Ok(vec![]));
        assert_eq!(parse_tagging_string("flag"), Ok(vec![Tag::new("flag", "")]));
    }
}
