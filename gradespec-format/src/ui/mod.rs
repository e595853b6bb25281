//! The user interfaces that show the progress and the results of an evaluation.
//!
//! The evaluation sends [`UIMessage`]s through a channel, a thread owning the [`UI`] receives them
//! and calls [`UI::finish`] when the channel is closed.

use std::sync::mpsc::{channel, Receiver, Sender};

use anyhow::Error;
pub use termcolor::WriteColor;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream};

use gradespec_diagnostics::Diagnostic;

pub use json::JsonUI;
pub use print::PrintUI;
pub use silent::SilentUI;
pub use ui_message::UIMessage;

mod json;
mod print;
mod silent;
mod ui_message;

/// Channel type for sending `UIMessage`s.
pub type UIChannelSender = Sender<UIMessage>;
/// Channel type for receiving `UIMessage`s.
pub type UIChannelReceiver = Receiver<UIMessage>;

lazy_static! {
    /// Whether the terminal supports ANSI 256 colors.
    static ref HAS_256: bool = {
        if std::env::var("GRADESPEC_ANSI256").as_deref() == Ok("true") {
            supports_color::on(supports_color::Stream::Stdout)
                .map(|support| support.has_256)
                .unwrap_or(false)
        } else {
            false
        }
    };
    /// The RED color to use with `cwrite!` and `cwriteln!`
    pub static ref RED: ColorSpec = {
        let mut color = ColorSpec::new();
        color
            .set_fg(Some(if *HAS_256 { Color::Ansi256(196) } else { Color::Red }))
            .set_intense(true)
            .set_bold(true);
        color
    };
    /// The GREEN color to use with `cwrite!` and `cwriteln!`
    pub static ref GREEN: ColorSpec = {
        let mut color = ColorSpec::new();
        color
            .set_fg(Some(if *HAS_256 { Color::Ansi256(118) } else { Color::Green }))
            .set_intense(true)
            .set_bold(true);
        color
    };
    /// The YELLOW color to use with `cwrite!` and `cwriteln!`
    pub static ref YELLOW: ColorSpec = {
        let mut color = ColorSpec::new();
        color
            .set_fg(Some(if *HAS_256 { Color::Ansi256(226) } else { Color::Yellow }))
            .set_intense(true)
            .set_bold(true);
        color
    };
    /// The ORANGE color to use with `cwrite!` and `cwriteln!`.
    pub static ref ORANGE: ColorSpec = {
        let mut color = ColorSpec::new();
        color
            .set_fg(Some(if *HAS_256 { Color::Ansi256(214) } else { Color::Rgb(255, 165, 0) }))
            .set_intense(true)
            .set_bold(true);
        color
    };
    /// The BLUE color to use with `cwrite!` and `cwriteln!`
    pub static ref BLUE: ColorSpec = {
        let mut color = ColorSpec::new();
        color
            .set_fg(Some(if *HAS_256 { Color::Ansi256(33) } else { Color::Blue }))
            .set_intense(true)
            .set_bold(true);
        color
    };
    /// The bold style to use with `cwrite!` and `cwriteln!`
    pub static ref BOLD: ColorSpec = {
        let mut color = ColorSpec::new();
        color.set_bold(true);
        color
    };
}

/// The sender of the UIMessage
#[derive(Debug)]
pub struct UIMessageSender {
    sender: UIChannelSender,
}

impl UIMessageSender {
    /// Make a new pair of UIMessageSender and ChannelReceiver.
    pub fn new() -> (UIMessageSender, UIChannelReceiver) {
        let (sender, receiver) = channel();
        (UIMessageSender { sender }, receiver)
    }

    /// Send a message to the channel.
    pub fn send(&self, message: UIMessage) -> Result<(), Error> {
        self.sender.send(message).map_err(|e| e.into())
    }

    /// Send a diagnostic message to the channel.
    pub fn send_diagnostic(&self, diagnostic: Diagnostic) -> Result<(), Error> {
        self.send(UIMessage::Diagnostic { diagnostic })
    }
}

/// The trait that describes the UI functionalities.
pub trait UI: Send {
    /// Process a new UI message.
    fn on_message(&mut self, message: UIMessage);
    /// Make the UI print the ending results.
    fn finish(&mut self);
}

/// The type of the UI to use, it enumerates all the known UI interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UIType {
    /// The `PrintUI`.
    Print,
    /// The `JsonUI`.
    Json,
    /// The `SilentUI`.
    Silent,
}

impl UIType {
    /// Make the UI of this type.
    pub fn build(&self) -> Box<dyn UI> {
        match self {
            UIType::Print => Box::new(PrintUI::new()),
            UIType::Json => Box::new(JsonUI::new()),
            UIType::Silent => Box::new(SilentUI::new()),
        }
    }
}

impl std::str::FromStr for UIType {
    type Err = String;

    fn from_str(s: &str) -> Result<UIType, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "print" => Ok(UIType::Print),
            "json" => Ok(UIType::Json),
            "silent" => Ok(UIType::Silent),
            _ => Err(format!("Unknown ui: {}", s)),
        }
    }
}

/// A simple printer that outputs to stdout. This can be used with `cwrite!` and `cwriteln!`.
pub struct StdoutPrinter {
    /// The actual stream.
    pub stream: StandardStream,
}

impl Default for StdoutPrinter {
    fn default() -> Self {
        Self {
            stream: StandardStream::stdout(ColorChoice::Auto),
        }
    }
}

/// Write to `$self.stream`, in the color specified as second parameter. The arguments that follow
/// will be passed to `write!`.
///
/// ```
/// use termcolor::ColorSpec;
/// use gradespec_format::ui::StdoutPrinter;
/// use gradespec_format::cwrite;
///
/// let mut color = ColorSpec::new();
/// color.set_bold(true);
///
/// let mut printer = StdoutPrinter::default();
/// cwrite!(printer, color, "The score is {}", 42);
/// ```
#[macro_export]
macro_rules! cwrite {
    ($self:expr, $color:expr, $($arg:tt)*) => {{
        use std::io::Write;
        use $crate::ui::WriteColor;
        let _ = $self.stream.set_color(&$color);
        let _ = write!(&mut $self.stream, $($arg)*);
        let _ = $self.stream.reset();
    }};
}

/// Write to `$self.stream`, in the color specified as second parameter. The arguments that follow
/// will be passed to `writeln!`.
///
/// ```
/// use termcolor::ColorSpec;
/// use gradespec_format::ui::StdoutPrinter;
/// use gradespec_format::cwriteln;
///
/// let mut color = ColorSpec::new();
/// color.set_bold(true);
///
/// let mut printer = StdoutPrinter::default();
/// cwriteln!(printer, color, "The score is {}", 42);
/// ```
#[macro_export]
macro_rules! cwriteln {
    ($self:expr, $color:expr, $($arg:tt)*) => {{
        use std::io::Write;
        use $crate::ui::WriteColor;
        let _ = $self.stream.set_color(&$color);
        let _ = writeln!(&mut $self.stream, $($arg)*);
        let _ = $self.stream.reset();
    }};
}
