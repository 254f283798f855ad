//! Export sinks for normalized tables.

mod xlsx;

pub use xlsx::SheetWriter;
