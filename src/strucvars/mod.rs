//! Structural variant (SV) related commands.

pub mod merge;
