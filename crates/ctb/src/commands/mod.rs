//! CLI command implementations.

pub(crate) mod md2md;

pub(crate) use md2md::Md2MdArgs;
