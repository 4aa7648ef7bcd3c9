//! Delimited rendering of templated files for review logs.
//!
//! A changed file is shown between an opening `<name>` rule and a closing
//! `</name>` rule so a reader can see exactly what was substituted.

/// Width a banner label is padded to.
pub const BANNER_WIDTH: usize = 80;

/// Render a banner rule: `<label> ` right-padded with `-` to [`BANNER_WIDTH`].
///
/// Labels at or beyond the width are emitted unpadded.
pub fn banner(label: &str) -> String {
    format!("{:-<width$}", format!("<{}> ", label), width = BANNER_WIDTH)
}

/// Render the full review block for one changed file.
///
/// Opening rule and closing rule each sit on their own line around the content.
pub fn render_changed_file(name: &str, content: &str) -> String {
    let mut out = String::new();
    out.push_str(&banner(name));
    out.push('\n');
    out.push_str(content);
    out.push('\n');
    out.push_str(&banner(&format!("/{}", name)));
    out.push('\n');
    out
}

// ============================================================================
// Tests
// ============================================================================
