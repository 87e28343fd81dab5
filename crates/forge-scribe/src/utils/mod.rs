//! Utilities for forge-scribe
//!
//! This module provides string helpers shared by the parser and the
//! resolver:
//! - Canonical title slugging used to match targets and links
//! - Edit distance suggestions for misspelled commands
//! - Whitespace normalisation

pub mod text;

pub use text::{canonical_title, edit_distance, nearest_name, simplified};
