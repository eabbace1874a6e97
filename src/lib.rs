#[cfg(feature = "cli")]
pub mod cli;
pub mod color;
pub mod config;
pub mod convert;
pub mod diagnostic;
pub mod dump;
pub mod error;
pub mod format;
pub mod naming;
pub mod path;
pub mod render;
pub mod svg;
pub mod transform;
pub mod xml;

#[cfg(feature = "cli")]
pub use cli::run;
pub use convert::{ConversionResult, WARNINGS_ARE_FATAL, convert, convert_to_tree};
pub use error::ConvertError;
pub use naming::to_valid_drawable_name;
