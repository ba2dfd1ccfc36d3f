//! Character-bounded truncation for stored and broadcast payloads.

/// Ceiling on stored payload length, in characters.
pub const STORAGE_LIMIT: usize = 100_000;

/// Marker appended to payloads cut at [`STORAGE_LIMIT`].
pub const STORAGE_MARKER: &str = "\n...[truncated]";

/// Ceiling on the inline preview carried by live events.
pub const PREVIEW_LIMIT: usize = 2_000;

/// Marker appended to previews cut at [`PREVIEW_LIMIT`].
pub const PREVIEW_MARKER: &str = "...";

/// Keep at most `max_chars` characters of `text`, appending `marker` if cut.
pub fn truncate_chars(text: &str, max_chars: usize, marker: &str) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{marker}", &text[..cut]),
        None => text.to_string(),
    }
}

/// Payload as written to the message log.
pub fn for_storage(text: &str) -> String {
    truncate_chars(text, STORAGE_LIMIT, STORAGE_MARKER)
}

/// Payload as carried by a live `message` event.
pub fn for_preview(text: &str) -> String {
    truncate_chars(text, PREVIEW_LIMIT, PREVIEW_MARKER)
}
