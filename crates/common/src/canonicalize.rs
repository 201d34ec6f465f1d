use std::collections::HashSet;
use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::value::RawValue;

const BODY_RAW: u8 = 0x00;
const BODY_JSON: u8 = 0x01;

/// Bytes that identify a request for fingerprinting.
pub fn canonical_request_bytes(method: &str, path_and_query: &str, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + path_and_query.len() + 16);
    write_str(&mut out, &method.to_ascii_uppercase());
    write_str(&mut out, path_and_query);

    match normalize_json(body) {
        Some(normalized) => {
            out.push(BODY_JSON);
            write_bytes(&mut out, normalized.as_bytes());
        }
        None => {
            out.push(BODY_RAW);
            write_bytes(&mut out, body);
        }
    }

    out
}

fn normalize_json(body: &[u8]) -> Option<String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    let raw: Box<RawValue> = serde_json::from_slice(body).ok()?;
    let mut out = String::with_capacity(body.len());
    write_canonical(&mut out, raw.get())?;
    Some(out)
}

struct Members(Vec<(String, Box<RawValue>)>);

impl<'de> Deserialize<'de> for Members {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MembersVisitor;

        impl<'de> Visitor<'de> for MembersVisitor {
            type Value = Members;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Members, A::Error> {
                let mut seen = HashSet::new();
                let mut members = Vec::new();
                while let Some((name, value)) = map.next_entry::<String, Box<RawValue>>()? {
                    if !seen.insert(name.clone()) {
                        return Err(de::Error::custom(format!("duplicate member {name:?}")));
                    }
                    members.push((name, value));
                }
                Ok(Members(members))
            }
        }

        deserializer.deserialize_map(MembersVisitor)
    }
}

// Numbers, booleans and null keep their literal text so no value is rounded.
fn write_canonical(out: &mut String, text: &str) -> Option<()> {
    let text = text.trim();
    match text.as_bytes().first()? {
        b'{' => {
            let Members(mut members) = serde_json::from_str(text).ok()?;
            members.sort_by(|(a, _), (b, _)| a.cmp(b));
            out.push('{');
            for (i, (name, value)) in members.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_str(out, name)?;
                out.push(':');
                write_canonical(out, value.get())?;
            }
            out.push('}');
        }
        b'[' => {
            let items: Vec<Box<RawValue>> = serde_json::from_str(text).ok()?;
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item.get())?;
            }
            out.push(']');
        }
        b'"' => {
            let s: String = serde_json::from_str(text).ok()?;
            write_json_str(out, &s)?;
        }
        _ => out.push_str(text),
    }
    Some(())
}

fn write_json_str(out: &mut String, s: &str) -> Option<()> {
    out.push_str(&serde_json::to_string(s).ok()?);
    Some(())
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    write_bytes(out, s.as_bytes());
}

fn write_bytes(out: &mut Vec<u8>, b: &[u8]) {
    out.extend_from_slice(&(b.len() as u32).to_le_bytes());
    out.extend_from_slice(b);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_key_order_ignored() {
        let a = canonical_request_bytes("POST", "/v1/reminders", br#"{"title":"milk","due":1}"#);
        let b = canonical_request_bytes(
            "POST",
            "/v1/reminders",
            b"{ \"due\": 1,\n  \"title\": \"milk\" }",
        );
        assert_eq!(a, b);
    }

    #[test]
    fn nested_objects_sorted() {
        let a = canonical_request_bytes("POST", "/x", br#"{"a":{"y":1,"x":[{"q":1,"p":2}]}}"#);
        let b = canonical_request_bytes("POST", "/x", br#"{"a":{"x":[{"p":2,"q":1}],"y":1}}"#);
        assert_eq!(a, b);
    }

    #[test]
    fn array_order_matters() {
        let a = canonical_request_bytes("POST", "/x", br#"{"tags":["a","b"]}"#);
        let b = canonical_request_bytes("POST", "/x", br#"{"tags":["b","a"]}"#);
        assert_ne!(a, b);
    }

    #[test]
    fn value_change_detected() {
        let a = canonical_request_bytes("POST", "/v1/reminders", br#"{"title":"milk"}"#);
        let b = canonical_request_bytes("POST", "/v1/reminders", br#"{"title":"eggs"}"#);
        assert_ne!(a, b);
    }

    #[test]
    fn method_and_path_participate() {
        let body = br#"{"title":"milk"}"#;
        let a = canonical_request_bytes("POST", "/v1/reminders", body);
        assert_eq!(a, canonical_request_bytes("post", "/v1/reminders", body));
        assert_ne!(a, canonical_request_bytes("PUT", "/v1/reminders", body));
        assert_ne!(a, canonical_request_bytes("POST", "/v1/reminders?x=1", body));
    }

    #[test]
    fn non_json_body_is_raw() {
        let a = canonical_request_bytes("POST", "/upload", b"hello world");
        let b = canonical_request_bytes("POST", "/upload", b"hello  world");
        assert_ne!(a, b);
    }

    #[test]
    fn json_and_raw_bodies_never_collide() {
        let json = canonical_request_bytes("POST", "/x", b"{}");
        let raw = canonical_request_bytes("POST", "/x", b"{");
        assert_ne!(json, raw);
    }

    #[test]
    fn escaped_strings_roundtrip() {
        let a = canonical_request_bytes("POST", "/x", r#"{"t":"a\"bé"}"#.as_bytes());
        let b = canonical_request_bytes("POST", "/x", br#"{ "t" : "a\"b\u00e9" }"#);
        assert_eq!(a, b);
    }

    #[test]
    fn large_integers_keep_full_precision() {
        let a = canonical_request_bytes("POST", "/x", br#"{"amount":18446744073709551616}"#);
        let b = canonical_request_bytes("POST", "/x", br#"{"amount":18446744073709551617}"#);
        assert_ne!(a, b);
        let c = canonical_request_bytes("POST", "/x", br#"{ "amount" : 18446744073709551616 }"#);
        assert_eq!(a, c);
    }

    #[test]
    fn long_decimals_keep_full_precision() {
        let a = canonical_request_bytes("POST", "/x", br#"{"rate":0.10000000000000000001}"#);
        let b = canonical_request_bytes("POST", "/x", br#"{"rate":0.10000000000000000002}"#);
        assert_ne!(a, b);
    }

    #[test]
    fn duplicate_members_are_hashed_raw() {
        let dup = br#"{"title":"a","title":"b"}"#;
        assert_eq!(normalize_json(dup), None);
        assert_eq!(normalize_json(br#"{"x":{"k":1,"k":2}}"#), None);

        let a = canonical_request_bytes("POST", "/x", dup);
        let b = canonical_request_bytes("POST", "/x", br#"{"title":"b"}"#);
        assert_ne!(a, b);
    }
}
