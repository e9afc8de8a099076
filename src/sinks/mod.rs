//! Built-in sink writers

pub mod console;
pub mod file;
pub mod table;

pub use console::ConsoleWriter;
pub use file::FileWriter;
pub use table::{TableWriter, TableWriterOptions};
