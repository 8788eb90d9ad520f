//! HTML rendering of a session
//!
//! Every function here is a pure read of its arguments; rendering the same
//! state twice yields byte-identical output.

use crate::persona::Persona;
use crate::session::{Role, SessionFlags, SessionView, Transcript};
use std::fmt::Write;

/// Reveal delay added per transcript position
pub const REVEAL_STEP_MS: usize = 200;

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// The chat bubbles, in transcript order
pub fn render_transcript(transcript: &Transcript) -> String {
    let mut html = String::new();
    for (index, turn) in transcript.turns().iter().enumerate() {
        let class = match turn.role() {
            Role::User => "user-message",
            Role::Model => "bot-message",
        };
        let _ = write!(
            html,
            "<div class=\"{class}\" style=\"animation-delay: {}ms;\">{}</div>",
            index * REVEAL_STEP_MS,
            html_escape(turn.text()).replace('\n', "<br>")
        );
    }
    html
}

/// Input row: text control plus a send button that is disabled while sending
pub fn render_controls(flags: &SessionFlags, persona: &Persona) -> String {
    let (label, disabled) = if flags.sending {
        (&persona.sending_label, " disabled")
    } else {
        (&persona.send_label, "")
    };
    format!(
        "<form id=\"chat-form\" class=\"chat-input\" data-send-label=\"{send}\" data-sending-label=\"{sending}\">\
<input id=\"chat-text\" name=\"text\" type=\"text\" autocomplete=\"off\" placeholder=\"{placeholder}\" value=\"{value}\"{disabled}>\
<button id=\"chat-send\" type=\"submit\"{disabled}>{label}</button>\
</form>",
        send = html_escape(&persona.send_label),
        sending = html_escape(&persona.sending_label),
        placeholder = html_escape(&persona.input_placeholder),
        value = html_escape(&flags.pending_input),
        label = html_escape(label),
    )
}

/// Full page for a session
pub fn render_page(persona: &Persona, view: &SessionView) -> String {
    format!(
        "<!DOCTYPE html>
<html lang=\"ja\">
<head>
<meta charset=\"utf-8\">
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">
<title>{title}</title>
<link rel=\"stylesheet\" href=\"/assets/chat.css\">
</head>
<body>
<header class=\"chat-header\">
<h1>{name}</h1>
<p>{tagline}</p>
</header>
<main id=\"chat\" class=\"chat-container\">{transcript}</main>
<footer class=\"chat-footer\">{controls}</footer>
<script src=\"/assets/chat.js\" defer></script>
</body>
</html>
",
        title = html_escape(&persona.page_title),
        name = html_escape(&persona.name),
        tagline = html_escape(&persona.tagline),
        transcript = render_transcript(&view.turns),
        controls = render_controls(&view.flags, persona),
    )
}
