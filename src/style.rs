//! Post-processing applied to every model reply before it is stored or sent.

use std::sync::OnceLock;

use regex::{Captures, Regex};

pub const CELEBRATION_SUFFIX: &str = " 🎉";
pub const WARNING_SUFFIX: &str = " ⚠️";

struct Rules {
    stray_bulb: Regex,
    italic: Regex,
    bold: Regex,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| Rules {
        // Some models glue a light bulb onto "you"
        stray_bulb: Regex::new(r"\byou 💡").expect("static regex"),
        italic: Regex::new(r"\*([^*\n]*?)\*").expect("static regex"),
        bold: Regex::new(r"\*\*([^*\n]*?)\*\*").expect("static regex"),
    })
}

/// Clean up markup quirks and append mood emoji.
///
/// Rules run in a fixed order:
/// 1. `you 💡` collapses to `you`
/// 2. `*text *` becomes `*text*`
/// 3. `** text**` becomes `**text**`
/// 4. a reply mentioning "great job" gets a celebration suffix
/// 5. a reply mentioning "error" or "fail" gets a warning suffix
pub fn stylize(text: &str) -> String {
    let rules = rules();

    let text = rules.stray_bulb.replace_all(text, "you");
    let text = rules.italic.replace_all(&text, |caps: &Captures| tighten(caps, "*"));
    let mut text = rules
        .bold
        .replace_all(&text, |caps: &Captures| tighten(caps, "**"))
        .into_owned();

    if text.to_lowercase().contains("great job") {
        text.push_str(CELEBRATION_SUFFIX);
    }
    let lower = text.to_lowercase();
    if lower.contains("error") || lower.contains("fail") {
        text.push_str(WARNING_SUFFIX);
    }

    text
}

/// Trim stray padding inside an emphasis span that is already attached to its
/// text on one side. Spans padded on both sides are left alone: `2 * 3 * 4`
/// is arithmetic, not markup.
fn tighten(caps: &Captures, marker: &str) -> String {
    let whole = &caps[0];
    let inner = &caps[1];
    let padded_start = inner.starts_with([' ', '\t']);
    let padded_end = inner.ends_with([' ', '\t']);

    if inner.trim().is_empty() || (padded_start && padded_end) {
        whole.to_string()
    } else {
        format!("{marker}{}{marker}", inner.trim_matches([' ', '\t']))
    }
}
