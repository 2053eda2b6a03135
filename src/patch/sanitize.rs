use crate::{Result, error::PatchpilotError};

/// Validate a file path for inclusion in a commit tree.
///
/// A single leading `/` is dropped so absolute-looking paths land relative
/// to the repository root. Empty paths and paths with a `..` segment are
/// rejected. Interior separators are left untouched.
pub fn sanitize(path: &str) -> Result<String> {
    let safe = path.strip_prefix('/').unwrap_or(path);

    if safe.is_empty() {
        return Err(PatchpilotError::validation("Empty path"));
    }

    if safe.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(PatchpilotError::validation(format!(
            "Unsafe path detected: {path}"
        )));
    }

    Ok(safe.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_single_leading_slash() {
        assert_eq!(sanitize("/src/a.ts").unwrap(), "src/a.ts");
        assert_eq!(sanitize("src/a.ts").unwrap(), "src/a.ts");
        assert_eq!(sanitize("//src/a.ts").unwrap(), "/src/a.ts");
    }

    #[test]
    fn rejects_empty_paths() {
        assert!(matches!(
            sanitize(""),
            Err(PatchpilotError::Validation(_))
        ));
        assert!(matches!(
            sanitize("/"),
            Err(PatchpilotError::Validation(_))
        ));
    }

    #[test]
    fn rejects_traversal() {
        for path in [
            "../../etc/passwd",
            "src/../../secrets",
            "/..",
            "docs/..",
            "..\\windows",
        ] {
            let err = sanitize(path).unwrap_err();
            assert!(
                matches!(err, PatchpilotError::Validation(ref m) if m.contains(path)),
                "expected {path} to be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn allows_dots_inside_names() {
        assert_eq!(sanitize("src/a..b.ts").unwrap(), "src/a..b.ts");
        assert_eq!(sanitize(".github/workflows/ci.yml").unwrap(), ".github/workflows/ci.yml");
    }

    #[test]
    fn keeps_interior_separators() {
        assert_eq!(sanitize("a//b/c.txt").unwrap(), "a//b/c.txt");
    }
}
