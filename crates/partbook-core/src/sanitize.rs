//! Sanitisation of user-provided names.
//!
//! Part names end up in filenames and wire payloads, so path separators,
//! null bytes, and non-printable characters are stripped on ingest.

/// Maximum length of a sanitised name.
const MAX_NAME_LEN: usize = 128;

/// Sanitise a user-provided string for use in filenames and paths.
///
/// Removes path separators and characters outside printable ASCII, collapses
/// runs of whitespace to single spaces, trims, and caps the length.
#[must_use = "returns the sanitised string"]
pub fn sanitize_name(value: &str) -> String {
    let filtered: String = value
        .chars()
        .filter(|c| !matches!(c, '/' | '\\') && (' '..='~').contains(c))
        .collect();

    let mut out = String::with_capacity(filtered.len());
    let mut last_was_space = true; // leading whitespace is dropped
    for c in filtered.chars() {
        if c == ' ' {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out.truncate(MAX_NAME_LEN);
    out
}

/// Short display name: the first six characters of the sanitised name.
#[must_use = "returns the shortened name"]
pub fn short_name(value: &str) -> String {
    sanitize_name(value).chars().take(6).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_path_separators() {
        assert_eq!(sanitize_name("Violin/I"), "ViolinI");
        assert_eq!(sanitize_name("..\\..\\etc"), "....etc");
    }

    #[test]
    fn strips_control_characters() {
        assert_eq!(sanitize_name("Vln\x00\x07 I"), "Vln I");
        assert_eq!(sanitize_name("Fl\u{00fc}gel"), "Flgel");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(sanitize_name("  Violin   I  "), "Violin I");
    }

    #[test]
    fn caps_length() {
        let long = "x".repeat(300);
        assert_eq!(sanitize_name(&long).len(), 128);
    }

    #[test]
    fn short_name_takes_six_chars() {
        assert_eq!(short_name("English Horn"), "Englis");
        assert_eq!(short_name("Vc"), "Vc");
    }
}
