//! Message catalogue for user-visible runtime text.
//!
//! Assert messages pass through [`text`] unless the macro author asks
//! for the raw string, so frameworks can ship message keys instead of
//! literal English.

use std::collections::HashMap;

use once_cell::sync::Lazy;

static MESSAGES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut table = HashMap::new();
    table.insert("macro.function.abort.message", "macro aborted");
    table.insert("macro.function.assert.failed", "assertion failed");
    table.insert("macro.function.general.noPerm", "insufficient permissions");
    table.insert("lineParser.maxRecursion", "maximum macro recursion reached");
    table.insert("lineParser.noContext", "no macro is currently executing");
    table
});

/// Looks up `key` in the catalogue, falling back to the key itself.
pub fn text(key: &str) -> String {
    MESSAGES.get(key).map_or_else(|| key.to_string(), |s| s.to_string())
}
