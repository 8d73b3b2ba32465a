//! Post-processing of raw model responses

/// Remove a markdown code fence wrapped around the whole response.
///
/// Only a leading ```` ```lang ```` line and a trailing ```` ``` ```` are
/// removed; fences inside the program are left alone.
pub fn strip_code_fences(text: &str) -> String {
    let mut body = text.trim();

    if let Some(rest) = body.strip_prefix("```") {
        let lang_len = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        if let Some(after) = rest[lang_len..].strip_prefix('\n') {
            body = after;
        } else if rest[lang_len..].starts_with("\r\n") {
            body = &rest[lang_len + 2..];
        }
    }

    if let Some(before) = body.strip_suffix("```") {
        if before.is_empty() {
            body = before;
        } else if let Some(code) = before
            .strip_suffix('\n')
            .map(|b| b.strip_suffix('\r').unwrap_or(b))
        {
            body = code;
        }
    }

    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_code_untouched() {
        assert_eq!(strip_code_fences("print('hi')\n"), "print('hi')");
    }

    #[test]
    fn test_fenced_with_language() {
        let raw = "```python\nimport math\nprint(math.pi)\n```";
        assert_eq!(strip_code_fences(raw), "import math\nprint(math.pi)");
    }

    #[test]
    fn test_fenced_without_language() {
        let raw = "\n```\nprint(1)\n```\n";
        assert_eq!(strip_code_fences(raw), "print(1)");
    }

    #[test]
    fn test_inner_fences_kept() {
        let raw = "```python\ndoc = \"\"\"\n```\n\"\"\"\nprint(doc)\n```";
        assert_eq!(strip_code_fences(raw), "doc = \"\"\"\n```\n\"\"\"\nprint(doc)");
    }

    #[test]
    fn test_crlf_fences() {
        let raw = "```py\r\nprint(2)\r\n```";
        assert_eq!(strip_code_fences(raw), "print(2)");
    }
}
