//! System locale detection for the renderer's first launch.

use std::convert::Infallible;

use tracing::debug;

/// Locale used when the system language has no translation.
pub const DEFAULT_LOCALE: &str = "en-US";

/// Environment variables consulted, in priority order.
const LOCALE_VARS: &[&str] = &["LC_ALL", "LC_MESSAGES", "LANG"];

/// Languages with a translation, keyed by ISO 639 language code.
const SUPPORTED: &[(&str, &str)] = &[("ja", "ja-JP")];

/// Detects the UI locale from the process environment.
pub fn detect() -> String {
    detect_with(|name| std::env::var(name).ok())
}

/// Detects the UI locale, reading variables through `var`.
///
/// Takes the first non-empty of `LC_ALL`, `LC_MESSAGES`, `LANG`, reduces
/// it to its language code (`ja_JP.UTF-8` → `ja`) and maps it to a
/// supported locale, falling back to [`DEFAULT_LOCALE`].
pub fn detect_with(var: impl Fn(&str) -> Option<String>) -> String {
    let raw = LOCALE_VARS
        .iter()
        .filter_map(|name| var(name))
        .find(|value| !value.is_empty());

    let language = raw.as_deref().and_then(|value| {
        value
            .split(['_', '-', '.', '@'])
            .next()
            .map(str::to_ascii_lowercase)
    });

    language
        .and_then(|lang| {
            SUPPORTED
                .iter()
                .find(|(code, _)| *code == lang)
                .map(|(_, locale)| (*locale).to_owned())
        })
        .unwrap_or_else(|| DEFAULT_LOCALE.to_owned())
}

/// Handler for [`api::DETECT_SYSTEM_LOCALE`](satchel::api::DETECT_SYSTEM_LOCALE).
pub async fn handle((): ()) -> Result<String, Infallible> {
    let locale = detect();
    debug!(%locale, "detected system locale");
    Ok(locale)
}
