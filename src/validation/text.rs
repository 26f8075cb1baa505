/// Escapes HTML special characters in user-supplied display text.
///
/// Stored names and messages are rendered by browser clients, so they are
/// escaped once on the way in.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&#34;")
        .replace('\'', "&#39;")
}
