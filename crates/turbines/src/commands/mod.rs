//! CLI command implementations.

pub(crate) mod build;
pub(crate) mod create;
pub(crate) mod serve;

pub(crate) use build::BuildArgs;
pub(crate) use create::CreateArgs;
pub(crate) use serve::ServeArgs;
