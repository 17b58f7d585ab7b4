//! Terminal styling for promoter output
//!
//! Every colored fragment carries a [`Tone`] and the stream it is written to;
//! `owo-colors` decides per stream whether to emit ANSI codes (`NO_COLOR`,
//! `CLICOLOR`, `CLICOLOR_FORCE`, TTY detection). Readiness and copy results
//! map to fixed marks so `status`, `promote` and `run` read the same way.

use gitops_promoter::promote::OperationStatus;
use gitops_promoter::promote::ladder::short_sha;
use gitops_promoter::types::{Condition, ConditionStatus};
use indicatif::ProgressStyle;
use owo_colors::{OwoColorize, Style};
use std::fmt::{self, Display};
use std::sync::OnceLock;

pub use owo_colors::Stream;

/// What a fragment of output means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Object, branch and request identifiers
    Accent,
    /// Ready, pushed, created
    Good,
    /// Failed or not ready
    Bad,
    /// Waiting on another object
    Pending,
    /// Secondary detail
    Quiet,
    /// Headings
    Strong,
}

impl Tone {
    const fn style(self) -> Style {
        match self {
            Self::Accent => Style::new().cyan(),
            Self::Good => Style::new().green(),
            Self::Bad => Style::new().red(),
            Self::Pending => Style::new().yellow(),
            Self::Quiet => Style::new().dimmed(),
            Self::Strong => Style::new().bold(),
        }
    }

    /// Failures and waits go to stderr unless redirected with `for_stdout`
    const fn stream(self) -> Stream {
        match self {
            Self::Bad | Self::Pending => Stream::Stderr,
            _ => Stream::Stdout,
        }
    }
}

/// A value rendered in a [`Tone`]
#[derive(Clone, Debug)]
pub struct Styled<T> {
    value: T,
    tone: Tone,
    stream: Stream,
}

impl<T> Styled<T> {
    const fn new(value: T, tone: Tone) -> Self {
        Self {
            value,
            tone,
            stream: tone.stream(),
        }
    }

    /// Detect color support on stdout instead of the tone's default stream
    #[must_use]
    pub const fn for_stdout(mut self) -> Self {
        self.stream = Stream::Stdout;
        self
    }
}

impl<T: Display> Display for Styled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let style = self.tone.style();
        write!(
            f,
            "{}",
            self.value.if_supports_color(self.stream, |v| v.style(style))
        )
    }
}

/// Tone shorthands for anything printable
pub trait Stylize: Display {
    /// Identifiers: names, branches, request numbers
    fn accent(&self) -> Styled<&Self> {
        Styled::new(self, Tone::Accent)
    }

    /// Positive counts and results
    fn success(&self) -> Styled<&Self> {
        Styled::new(self, Tone::Good)
    }

    /// Failure text (stderr)
    fn error(&self) -> Styled<&Self> {
        Styled::new(self, Tone::Bad)
    }

    /// Readiness waits (stderr)
    fn warn(&self) -> Styled<&Self> {
        Styled::new(self, Tone::Pending)
    }

    /// Hints, URLs, condition messages
    fn muted(&self) -> Styled<&Self> {
        Styled::new(self, Tone::Quiet)
    }

    /// Headings and the object being acted on
    fn emphasis(&self) -> Styled<&Self> {
        Styled::new(self, Tone::Strong)
    }
}

impl<T: Display + ?Sized> Stylize for T {}

/// Green tick
pub const fn check() -> Styled<&'static str> {
    Styled::new("✓", Tone::Good)
}

/// Red cross, on stderr
pub const fn cross() -> Styled<&'static str> {
    Styled::new("✗", Tone::Bad)
}

/// Source-to-target arrow
pub const fn arrow() -> Styled<&'static str> {
    Styled::new("→", Tone::Accent)
}

/// Mark for a Ready condition: tick, cross, or `?` before the first reconcile
pub fn readiness(condition: Option<&Condition>) -> Styled<&'static str> {
    match condition.map(|c| c.status) {
        Some(ConditionStatus::True) => check(),
        Some(ConditionStatus::False) => cross().for_stdout(),
        Some(ConditionStatus::Unknown) | None => Styled::new("?", Tone::Quiet),
    }
}

/// Mark for one copy operation's result
pub const fn operation(status: &OperationStatus) -> Styled<&'static str> {
    match status {
        OperationStatus::Pushed { .. } => check(),
        OperationStatus::Unchanged => Styled::new("-", Tone::Quiet),
    }
}

/// Abbreviated commit hash
pub fn commit(hash: &str) -> Styled<&str> {
    Styled::new(short_sha(hash), Tone::Accent)
}

/// `#<number>` for a pull request
pub fn request(number: u64) -> Styled<String> {
    Styled::new(format!("#{number}"), Tone::Accent)
}

/// A pull request URL, clickable (OSC 8) where the terminal supports it
pub fn request_link(stream: Stream, url: &str) -> String {
    let target = match stream {
        Stream::Stdout => supports_hyperlinks::Stream::Stdout,
        Stream::Stderr => supports_hyperlinks::Stream::Stderr,
    };
    if supports_hyperlinks::on(target) {
        terminal_link::Link::new(url, url).to_string()
    } else {
        url.to_string()
    }
}

/// Spinner shown while a promotion phase runs
pub fn spinner_style() -> ProgressStyle {
    static STYLE: OnceLock<ProgressStyle> = OnceLock::new();
    STYLE
        .get_or_init(|| {
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("hardcoded spinner template is valid")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        })
        .clone()
}
