pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod git;
pub mod monorepo;
pub mod npm;
pub mod package;
mod path_helpers;
pub mod result;
pub mod version;

pub use cli::{Args, Command};
pub use error::MonorailError;
pub use result::Result;

#[cfg(test)]
pub mod test_helpers;
