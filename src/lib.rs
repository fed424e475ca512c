pub mod action;
pub mod arrow;
pub mod closure;
pub mod config;
pub mod digest;
pub mod engine;
pub mod error;
pub mod fs;
pub mod gc;
pub mod path;
pub mod printer;
pub mod registry;
pub mod rule;
pub mod sandbox;
pub mod source_copy;
pub mod timestamp;
pub mod trace;

pub use action::Action;
pub use arrow::{both, contents, file_exists, glob, lines_of, paths, record_lib_deps, Build};
pub use config::{Context, EngineConfig};
pub use digest::{Digest, DigestFactory};
pub use engine::BuildEngine;
pub use error::{ActionError, BuildError};
pub use fs::{FileSystem, RealFileSystem};
pub use path::{Kind, Path};
pub use printer::{Printer, StandardPrinter};
pub use rule::PreRule;
