#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::cmd::reminders::{build_payload, load_payload, CreateArgs};
    use crate::cmd::token::{mint, TokenCmd};
    use idemgate_common::token::validate_token;

    fn args(title: Option<&str>, data: Option<&str>) -> CreateArgs {
        CreateArgs {
            title: title.map(String::from),
            data: data.map(String::from),
            due_at_ms: Some(42),
            key: None,
            attempts: 1,
        }
    }

    #[test]
    fn payload_from_inline_json() {
        let v = load_payload(r#"{"title":"a"}"#).unwrap();
        assert_eq!(v["title"], "a");
    }

    #[test]
    fn payload_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"title":"from file"}}"#).unwrap();
        let v = load_payload(f.path().to_str().unwrap()).unwrap();
        assert_eq!(v["title"], "from file");
    }

    #[test]
    fn payload_rejects_garbage() {
        assert!(load_payload("not json").is_err());
    }

    #[test]
    fn payload_from_title_carries_due_date() {
        let v = build_payload(&args(Some("a"), None)).unwrap();
        assert_eq!(v, serde_json::json!({"title": "a", "due_at_ms": 42}));
        assert!(build_payload(&args(None, None)).is_err());
    }

    #[test]
    fn minted_token_validates() {
        let cmd = TokenCmd {
            subject: "alice".into(),
            secret: "s3cret".into(),
            ttl_secs: 60,
        };
        let token = mint(&cmd, 1_000).unwrap();
        assert_eq!(validate_token(b"s3cret", &token, 2_000).unwrap(), "alice");
        assert!(validate_token(b"s3cret", &token, 62_000).is_err());
    }

    #[test]
    fn empty_subject_rejected() {
        let cmd = TokenCmd {
            subject: " ".into(),
            secret: "s".into(),
            ttl_secs: 60,
        };
        assert!(mint(&cmd, 0).is_err());
    }
}
