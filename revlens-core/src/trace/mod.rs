//! Domain-level action tracing: every page interaction is recorded as a
//! start/finish/error entry in one shared, append-only log, and the nesting
//! structure is reconstructed from the flat entries for diagnostics.

mod format;
mod logger;

pub use format::{indent_entries, paragraph_entries, standard_format};
pub use logger::{
    EchoFormatter, EntryFormatter, ErrorOnlyFormatter, StandardFormatter, TraceLog, TraceValue,
    Tracer,
};
