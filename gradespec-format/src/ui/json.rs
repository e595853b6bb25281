use crate::ui::*;

/// This UI will print to stdout the UI messages as json, one per line.
#[derive(Default)]
pub struct JsonUI;

impl JsonUI {
    /// Make a new `JsonUI`.
    pub fn new() -> JsonUI {
        JsonUI {}
    }
}

impl UI for JsonUI {
    fn on_message(&mut self, message: UIMessage) {
        match serde_json::to_string(&message) {
            Ok(message) => println!("{}", message),
            Err(e) => error!("Failed to serialize UI message: {}", e),
        }
    }

    fn finish(&mut self) {}
}
