//! Embedded assets bundled at compile time
//!
//! The default instruction prompt and the chat welcome banner ship inside the
//! binary so the agent runs without any files next to it.

use include_dir::{include_dir, Dir};

/// Embedded `assets/` directory
///
/// Directory structure:
/// ```text
/// assets/
/// └── prompts/
///     ├── instructions.md
///     └── welcome.md
/// ```
pub static ASSETS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/assets");

/// Get any embedded file by path relative to `assets/`
pub fn get_file(path: &str) -> Option<&'static str> {
    ASSETS.get_file(path)?.contents_utf8()
}

/// Welcome banner shown when a chat session opens
pub fn welcome_message() -> &'static str {
    get_file("prompts/welcome.md")
        .map(str::trim)
        .unwrap_or("Kubernetes Discovery Assistant ready. How can I help?")
}

/// List the bundled prompt names (without `.md`)
pub fn list_prompts() -> Vec<&'static str> {
    ASSETS
        .get_dir("prompts")
        .map(|dir| {
            dir.files()
                .filter_map(|file| {
                    let name = file.path().file_name()?.to_str()?;
                    name.strip_suffix(".md")
                })
                .collect()
        })
        .unwrap_or_default()
}
