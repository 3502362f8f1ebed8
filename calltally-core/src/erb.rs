//! Ruby code extraction from ERB templates.
//!
//! Only the code inside `<% %>` and `<%= %>` tags survives; template text
//! and `<%# %>` comments are dropped. Each tag becomes one line so
//! block openers like `<% @posts.each do |p| %>` pair up with a later
//! `<% end %>`.

const OPEN: &str = "<%";
const CLOSE: &str = "%>";

/// Returns the Ruby code embedded in `template`, one tag per line.
pub fn extract_ruby(template: &str) -> String {
    let mut out = String::new();
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];

        // <%% is an escaped literal
        if let Some(stripped) = after_open.strip_prefix('%') {
            rest = stripped;
            continue;
        }

        let (body, remainder) = match after_open.find(CLOSE) {
            Some(end) => (&after_open[..end], &after_open[end + CLOSE.len()..]),
            None => (after_open, ""),
        };
        rest = remainder;

        if body.starts_with('#') {
            continue;
        }

        let code = body
            .trim_start_matches("==")
            .trim_start_matches(['=', '-'])
            .trim_end_matches('-')
            .trim();
        if !code.is_empty() {
            out.push_str(code);
            out.push('\n');
        }
    }

    out
}
