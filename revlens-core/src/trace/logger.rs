use std::future::Future;
use std::sync::{Arc, Mutex};

/// Append-only collection of formatted log entries. Cloning shares the
/// underlying entries, so several tracers (e.g. a verbose one for top-level
/// steps and an error-only one for the per-element loop) interleave their
/// output into a single ordered sequence.
#[derive(Debug, Clone, Default)]
pub struct TraceLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, line: String) {
        self.entries.lock().unwrap().push(line);
    }

    /// Snapshot of the entries recorded so far.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }
}

/// Renders one log entry per traced event. Returning `None` suppresses the
/// entry entirely.
pub trait EntryFormatter: Send + Sync {
    fn format_start(&self, action: &str) -> Option<String>;
    fn format_finish(&self, action: &str, value: Option<&str>) -> Option<String>;
    fn format_error(&self, action: &str, error: &str) -> Option<String>;
    fn format_note(&self, text: &str) -> Option<String>;
}

/// The standard entry wording. The `Start:`/`Finish:` prefixes are load
/// bearing: log reconstruction counts them to recover nesting.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFormatter;

impl EntryFormatter for StandardFormatter {
    fn format_start(&self, action: &str) -> Option<String> {
        Some(format!("Start: {action}"))
    }

    fn format_finish(&self, action: &str, value: Option<&str>) -> Option<String> {
        Some(match value {
            Some(value) => format!("Finish: {action} with result {value}"),
            None => format!("Finish: {action}"),
        })
    }

    fn format_error(&self, action: &str, error: &str) -> Option<String> {
        Some(format!("ERROR:  {action} failed with error \"{error}\""))
    }

    fn format_note(&self, text: &str) -> Option<String> {
        Some(text.to_string())
    }
}

/// Suppresses everything except errors. Used for the inner per-element loop
/// so the diagnostics stay readable when a page holds hundreds of reviews.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorOnlyFormatter;

impl EntryFormatter for ErrorOnlyFormatter {
    fn format_start(&self, _action: &str) -> Option<String> {
        None
    }

    fn format_finish(&self, _action: &str, _value: Option<&str>) -> Option<String> {
        None
    }

    fn format_error(&self, action: &str, error: &str) -> Option<String> {
        StandardFormatter.format_error(action, error)
    }

    fn format_note(&self, _text: &str) -> Option<String> {
        None
    }
}

/// Decorates another formatter, printing every entry it produces to stdout
/// as it happens. This is the streaming diagnostics mode; the entry still
/// lands in the shared log for the final reconstruction.
pub struct EchoFormatter<F> {
    inner: F,
}

impl<F: EntryFormatter> EchoFormatter<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    fn echo(line: Option<String>) -> Option<String> {
        if let Some(line) = &line {
            println!("{line}");
        }
        line
    }
}

impl<F: EntryFormatter> EntryFormatter for EchoFormatter<F> {
    fn format_start(&self, action: &str) -> Option<String> {
        Self::echo(self.inner.format_start(action))
    }

    fn format_finish(&self, action: &str, value: Option<&str>) -> Option<String> {
        Self::echo(self.inner.format_finish(action, value))
    }

    fn format_error(&self, action: &str, error: &str) -> Option<String> {
        Self::echo(self.inner.format_error(action, error))
    }

    fn format_note(&self, text: &str) -> Option<String> {
        Self::echo(self.inner.format_note(text))
    }
}

/// Opt-in rendering of a traced action's result into its finish entry.
/// Strings and numbers render; handles and collections do not.
pub trait TraceValue {
    fn trace_value(&self) -> Option<String> {
        None
    }
}

impl TraceValue for () {}

impl TraceValue for String {
    fn trace_value(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl TraceValue for &str {
    fn trace_value(&self) -> Option<String> {
        Some((*self).to_string())
    }
}

macro_rules! numeric_trace_value {
    ($($ty:ty),*) => {
        $(impl TraceValue for $ty {
            fn trace_value(&self) -> Option<String> {
                Some(self.to_string())
            }
        })*
    };
}

numeric_trace_value!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64);

impl<T: TraceValue> TraceValue for Option<T> {
    fn trace_value(&self) -> Option<String> {
        self.as_ref().and_then(TraceValue::trace_value)
    }
}

impl<T> TraceValue for Vec<T> {}

/// Records start/finish/error entries around any asynchronous action.
/// Cloning is cheap; `with_formatter` swaps the wording while keeping the
/// same underlying log.
#[derive(Clone)]
pub struct Tracer {
    formatter: Arc<dyn EntryFormatter>,
    log: TraceLog,
}

impl Tracer {
    pub fn new(formatter: impl EntryFormatter + 'static, log: TraceLog) -> Self {
        Self {
            formatter: Arc::new(formatter),
            log,
        }
    }

    /// A tracer with different wording writing into the same log.
    pub fn with_formatter(&self, formatter: impl EntryFormatter + 'static) -> Tracer {
        Tracer {
            formatter: Arc::new(formatter),
            log: self.log.clone(),
        }
    }

    pub fn log(&self) -> &TraceLog {
        &self.log
    }

    /// Appends a free-text entry outside any start/finish block.
    pub fn note(&self, text: &str) {
        if let Some(line) = self.formatter.format_note(text) {
            self.log.push(line);
        }
    }

    /// Emits a start entry, runs the action, then emits a finish entry on
    /// success or an error entry on failure. The error is propagated
    /// unchanged; the tracer never swallows it.
    pub async fn trace<T, E, Fut>(&self, action: impl AsRef<str>, fut: Fut) -> Result<T, E>
    where
        T: TraceValue,
        E: std::fmt::Display,
        Fut: Future<Output = Result<T, E>>,
    {
        let action = action.as_ref();
        if let Some(line) = self.formatter.format_start(action) {
            self.log.push(line);
        }
        match fut.await {
            Ok(value) => {
                let rendered = value.trace_value();
                if let Some(line) = self.formatter.format_finish(action, rendered.as_deref()) {
                    self.log.push(line);
                }
                Ok(value)
            }
            Err(error) => {
                if let Some(line) = self
                    .formatter
                    .format_error(action, &error.to_string())
                {
                    self.log.push(line);
                }
                Err(error)
            }
        }
    }
}
