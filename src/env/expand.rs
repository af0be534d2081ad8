//! Shell-style variable expansion.
//!
//! # Syntax
//!
//! - `$NAME` - ASCII letters, digits and `_`
//! - `${NAME}` - anything up to the closing brace
//! - `$*`, `$#`, `$$`, `$@`, `$!`, `$?`, `$-`, `$0`..`$9` - single character names
//!
//! Undefined variables are the mapping's business; the engine maps them to
//! an empty string. `${}` and an unterminated `${` are invalid and are
//! dropped from the output. A `$` that is not followed by a name is kept.

/// Expand `$NAME` and `${NAME}` references in `input` using `mapping`.
///
/// # Example
///
/// ```
/// use runway::env::expand;
///
/// let out = expand("${GREETING}, $NAME!", |name| match name {
///     "GREETING" => "Hello".to_string(),
///     "NAME" => "World".to_string(),
///     _ => String::new(),
/// });
/// assert_eq!(out, "Hello, World!");
/// ```
pub fn expand<F>(input: &str, mut mapping: F) -> String
where
    F: FnMut(&str) -> String,
{
    let bytes = input.as_bytes();
    let mut output = String::with_capacity(input.len());
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' || i + 1 >= bytes.len() {
            i += 1;
            continue;
        }

        output.push_str(&input[literal_start..i]);
        let (name, width) = shell_name(&input[i + 1..]);
        match name {
            // invalid syntax, eat it
            None if width > 0 => {}
            None => output.push('$'),
            Some(name) => output.push_str(&mapping(name)),
        }

        i += 1 + width;
        literal_start = i;
    }

    output.push_str(&input[literal_start..]);
    output
}

/// Read the name following a `$`. Returns the name (if any) and how many
/// bytes were consumed.
fn shell_name(rest: &str) -> (Option<&str>, usize) {
    let bytes = rest.as_bytes();

    if bytes[0] == b'{' {
        if bytes.len() > 2 && is_special(bytes[1]) && bytes[2] == b'}' {
            return (Some(&rest[1..2]), 3);
        }
        return match bytes[1..].iter().position(|&c| c == b'}') {
            // "${}"
            Some(0) => (None, 2),
            Some(offset) => (Some(&rest[1..offset + 1]), offset + 2),
            // "${" without a closing brace
            None => (None, 1),
        };
    }

    if is_special(bytes[0]) {
        return (Some(&rest[0..1]), 1);
    }

    let len = bytes
        .iter()
        .take_while(|&&c| c.is_ascii_alphanumeric() || c == b'_')
        .count();
    if len == 0 {
        (None, 0)
    } else {
        (Some(&rest[..len]), len)
    }
}

fn is_special(c: u8) -> bool {
    matches!(c, b'*' | b'#' | b'$' | b'@' | b'!' | b'?' | b'-') || c.is_ascii_digit()
}
