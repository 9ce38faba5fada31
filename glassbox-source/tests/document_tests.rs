use glassbox_source::{
    escape_embedded, normalize, prepare, unescape_embedded, ERROR_MARKER,
};
use pretty_assertions::assert_eq;

#[test]
fn test_escape_round_trip_is_exact() {
    let source = "local s = \"quoted\"\nlocal p = \"a\\\\b\"\nreturn s .. p";
    assert_eq!(unescape_embedded(&escape_embedded(source)), source);
}

#[test]
fn test_escape_orders_backslash_first() {
    // A backslash followed by a quote must become four chars, not a broken
    // double-escape of the quote.
    assert_eq!(escape_embedded("\\\""), "\\\\\\\"");
}

#[test]
fn test_prepare_produces_guarded_document() {
    let document = prepare("function Widget()\n    return h(\"Text\", { text = \"hi\" })\nend");
    assert_eq!(document.identifier(), "Widget");
    assert!(document.chunk().contains("xpcall"));
    assert!(document.chunk().contains(ERROR_MARKER));
    assert!(document.chunk().contains("__glassbox_load"));
    assert!(document.chunk().contains("__glassbox_report"));
}

#[test]
fn test_embedded_source_is_single_line_string() {
    let normalized = normalize("function Widget()\n    return nil\nend");
    let escaped = escape_embedded(normalized.source());
    assert!(!escaped.contains('\n'));
    assert_eq!(unescape_embedded(&escaped), normalized.source());
}
