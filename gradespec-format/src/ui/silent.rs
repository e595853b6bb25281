use crate::ui::*;

/// This UI never prints anything, the completed checks only go to the debug log.
#[derive(Default)]
pub struct SilentUI {
    completed: usize,
}

impl SilentUI {
    pub fn new() -> SilentUI {
        SilentUI::default()
    }
}

impl UI for SilentUI {
    fn on_message(&mut self, message: UIMessage) {
        if let UIMessage::TestCompleted { number, status, .. } = message {
            self.completed += 1;
            debug!("Test {} completed: {}", number, status.as_str());
        }
    }

    fn finish(&mut self) {
        debug!("{} tests completed", self.completed);
    }
}
