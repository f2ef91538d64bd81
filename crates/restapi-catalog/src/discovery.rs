//! "Match as much as you gave me" help for unknown endpoints.

use crate::compile::TELL_PREFIX;
use crate::descriptor::{CommandDescriptor, Flavor};
use crate::signature::ArgKind;

/// Placeholder shown for the tell target in rendered command forms.
pub const OSDID_PLACEHOLDER: &str = "<osdid>";

/// Lead word and placeholder of placement-group command forms.
pub const PG_PREFIX: &str = "pg";
pub const PGID_PLACEHOLDER: &str = "<pgid>";

/// Width at which usage strings wrap inside the help table.
const USAGE_WIDTH: usize = 40;

/// Command-word prefix a client probably meant by `rel_path`.
///
/// Segments are joined by spaces to line up with concise forms; the id
/// in `tell/<id>/...` becomes [`OSDID_PLACEHOLDER`] and the one in
/// `pg/<id>/...` becomes [`PGID_PLACEHOLDER`].
pub fn discovery_prefix(rel_path: &str) -> String {
    let mut words: Vec<&str> = rel_path.split('/').filter(|s| !s.is_empty()).collect();
    if words.len() >= 2 {
        if words[0] == TELL_PREFIX {
            words[1] = OSDID_PLACEHOLDER;
        } else if words[0] == PG_PREFIX {
            words[1] = PGID_PLACEHOLDER;
        }
    }
    words.join(" ")
}

/// Flavor-aware concise form a discovery prefix is matched against.
///
/// pg commands gain a `pg <pgid>` lead and tell commands a
/// `tell <osdid>` lead.
pub fn rendered_form(desc: &CommandDescriptor) -> String {
    let concise = desc.concise();
    match desc.flavor {
        Flavor::TellTarget => format!("{TELL_PREFIX} {OSDID_PLACEHOLDER} {concise}"),
        Flavor::PgTarget => format!("{PG_PREFIX} {PGID_PLACEHOLDER} {concise}"),
        Flavor::Standard => concise,
    }
}

/// How one would send a REST request for `desc`, e.g.
/// `osd/pool/set?pool=<pool>&var=size|min_size`.
pub fn usage_for_uri(desc: &CommandDescriptor) -> String {
    let mut prefix = Vec::new();
    let mut args = Vec::new();
    for d in &desc.signature {
        match &d.kind {
            ArgKind::Prefix(word) => prefix.push(word.clone()),
            _ => args.push(format!("{}={}", d.name, d.helpstr())),
        }
    }
    let mut out = String::new();
    if desc.flavor == Flavor::TellTarget {
        out.push_str(&format!("{TELL_PREFIX}/{OSDID_PLACEHOLDER}/"));
    }
    out.push_str(&prefix.join("/"));
    if !args.is_empty() {
        out.push('?');
        out.push_str(&args.join("&"));
    }
    out
}

/// Method a client should use for `desc` in the help table.
fn method_label(desc: &CommandDescriptor) -> &'static str {
    if desc.permission.writes() {
        "PUT"
    } else if desc.permission.reads() {
        "GET"
    } else {
        "-"
    }
}

/// HTML table of every command whose rendered form starts with `prefix`,
/// or `None` when nothing matches. `commands` is scanned in order.
pub fn render_help(commands: &[CommandDescriptor], prefix: &str) -> Option<String> {
    let mut rows = String::new();
    for desc in commands {
        if !rendered_form(desc).starts_with(prefix) {
            continue;
        }
        rows.push_str("<tr><td>");
        for line in textwrap::wrap(&usage_for_uri(desc), USAGE_WIDTH) {
            rows.push_str(&escape_html(&line));
            rows.push('\n');
        }
        rows.push_str("</td><td>");
        rows.push_str(method_label(desc));
        rows.push_str("</td><td>");
        rows.push_str(&escape_html(&desc.help));
        rows.push_str("</td></tr>\n");
    }
    if rows.is_empty() {
        return None;
    }
    Some(format!(
        "<html><body><table border=1><th>Possible commands:</th><th>Method</th><th>Description</th>{rows}</table></body></html>"
    ))
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
