//! Configuration template rendering.
//!
//! Router configuration files are template text; the core renders them
//! with every `{{…}}` action trimmed to empty, and the caller consumes
//! the result.

use crate::error::ClientError;

/// Render template `contents` with all variables trimmed empty.
///
/// # Errors
///
/// [`ClientError::Usage`] on an unterminated `{{` action.
pub fn render_config(contents: &str) -> Result<String, ClientError> {
    let mut out = String::with_capacity(contents.len());
    let mut rest = contents;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            return Err(ClientError::Usage("unterminated template action".to_owned()));
        };
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::render_config;

    #[test]
    fn actions_are_trimmed_empty() {
        let rendered = render_config("entity={{ .Entity }}\nrouter={{.Router}}:28589\n").unwrap();
        assert_eq!(rendered, "entity=\nrouter=:28589\n");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(render_config("no actions here").unwrap(), "no actions here");
    }

    #[test]
    fn unterminated_action_errors() {
        assert!(render_config("broken {{ .Oops").is_err());
    }
}
