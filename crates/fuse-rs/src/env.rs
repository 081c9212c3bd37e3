use std::env;
use std::sync::OnceLock;

static FUSE_RS_VERIFY: OnceLock<Option<bool>> = OnceLock::new();
static FUSE_RS_MAX_PASSES: OnceLock<Option<usize>> = OnceLock::new();

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

/// `FUSE_RS_VERIFY`: force index verification after every rewrite.
pub(crate) fn verify_override() -> Option<bool> {
    *FUSE_RS_VERIFY.get_or_init(|| match env::var("FUSE_RS_VERIFY") {
        Ok(value) if !value.trim().is_empty() => Some(parse_bool(&value)),
        _ => None,
    })
}

/// `FUSE_RS_MAX_PASSES`: cap on fusion passes; ignored unless a positive integer.
pub(crate) fn max_passes_override() -> Option<usize> {
    *FUSE_RS_MAX_PASSES.get_or_init(|| {
        env::var("FUSE_RS_MAX_PASSES")
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|passes| *passes > 0)
    })
}
