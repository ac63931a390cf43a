//! Project-local display preferences (`.kicad_prl`).

use log::warn;
use serde_json::{Map, Value, json};

const DRAWING_SHEET: &str = "drawing_sheet";

/// Rewrite `.kicad_prl` JSON so the board view hides the drawing sheet.
///
/// `existing` is the current file contents, if any. Input that is not a JSON
/// object is replaced by a fresh document. Other settings are preserved.
pub fn hide_drawing_sheet(existing: Option<&str>, file_name: &str) -> String {
    let mut data = match existing.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => map,
        Some(Ok(_)) | Some(Err(_)) => {
            warn!("Ignoring unreadable project preferences; writing a fresh {file_name}");
            Map::new()
        }
        None => Map::new(),
    };

    if !data.get("board").is_some_and(Value::is_object) {
        data.insert("board".to_string(), Value::Object(Map::new()));
    }

    if let Some(Value::Object(board)) = data.get_mut("board") {
        let visible: Vec<Value> = match board.get("visible_items") {
            Some(Value::Array(items)) => items
                .iter()
                .filter(|item| item.as_str() != Some(DRAWING_SHEET))
                .cloned()
                .collect(),
            _ => Vec::new(),
        };
        board.insert("visible_items".to_string(), Value::Array(visible));
    }

    data.insert(
        "meta".to_string(),
        json!({ "filename": file_name, "version": 5 }),
    );

    let mut out = serde_json::to_string_pretty(&Value::Object(data)).unwrap_or_default();
    out.push('\n');
    out
}
