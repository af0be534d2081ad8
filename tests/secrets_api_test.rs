//! Integration tests for secret collection and streaming redaction.

use std::io::Write;

use runway::config::parse_inventory;
use runway::env::EnvironmentItem;
use runway::secrets::{is_secret_filtering, RedactingWriter, SecretSet, REDACTED};

fn redact_in_chunks(secrets: &SecretSet, input: &str, chunk: usize) -> String {
    let mut writer = RedactingWriter::new(secrets, Vec::new());
    for piece in input.as_bytes().chunks(chunk) {
        writer.write_all(piece).unwrap();
    }
    String::from_utf8(writer.finish().unwrap()).unwrap()
}

#[test]
fn inventory_secrets_are_collected() {
    let items = parse_inventory(
        r#"
envs:
  - USER_NAME: deployer
  - PASSWORD: "p4ss word"
  - BASIC_AUTH: "$USER_NAME:$PASSWORD"
    opts:
      is_expand: true
  - EMPTY: ""
"#,
    )
    .unwrap();

    let secrets = SecretSet::from_items(&items).unwrap();
    assert!(secrets.contains("deployer"));
    assert!(secrets.contains("deployer:p4ss word"));
    assert!(!secrets.contains(""));
    assert_eq!(secrets.len(), 3);
}

#[test]
fn chunk_size_does_not_change_output() {
    let secrets = SecretSet::new(["ABC123", "hunter2"]);
    let input = "login hunter2 with ABC123, not ABC12 or hunter";
    let expected = format!("login {REDACTED} with {REDACTED}, not ABC12 or hunter");

    for chunk in 1..=input.len() {
        assert_eq!(redact_in_chunks(&secrets, input, chunk), expected, "chunk {chunk}");
    }
}

#[test]
fn longest_secret_wins_at_same_position() {
    let secrets = SecretSet::new(["abc", "abcdef"]);
    assert_eq!(
        redact_in_chunks(&secrets, "xabcdefx abcx", 2),
        format!("x{REDACTED}x {REDACTED}x")
    );
}

#[test]
fn multiline_secret_keeps_line_structure() {
    let secrets = SecretSet::new(["line one\nline two"]);
    assert_eq!(
        redact_in_chunks(&secrets, "key:\nline one\nline two\ndone\n", 3),
        format!("key:\n{REDACTED}\n{REDACTED}\ndone\n")
    );
}

#[test]
fn held_prefix_is_released_at_end() {
    let secrets = SecretSet::new(["secret-value"]);
    let mut writer = RedactingWriter::new(&secrets, Vec::new());
    writer.write_all(b"output ends with secret-").unwrap();
    assert_eq!(writer.get_ref().as_slice(), b"output ends with ");
    assert_eq!(writer.pending_len(), "secret-".len());

    let output = writer.finish().unwrap();
    assert_eq!(output, b"output ends with secret-");
}

#[test]
fn no_secrets_pass_through() {
    let secrets = SecretSet::default();
    assert_eq!(redact_in_chunks(&secrets, "nothing to hide", 4), "nothing to hide");
}

#[test]
fn filtering_switch_follows_secrets() {
    let disabled = vec![EnvironmentItem::new("RUNWAY_SECRET_FILTERING", "false")];
    assert!(!is_secret_filtering(None, &disabled).unwrap());
    assert!(is_secret_filtering(Some(true), &disabled).unwrap());
    assert!(is_secret_filtering(None, &[]).unwrap());
}
