//! Documentation comment parsing
//!
//! The parser turns comment text written in the markup language into a
//! [`Doc`](crate::doc::Doc). The pieces around it:
//! - [`commands`]: the table of built-in commands
//! - [`macros`]: user-defined macros from the configuration
//! - [`condition`]: evaluation of `\if` conditions
//! - [`openedlist`]: numbering of `\list` items
//! - [`quoter`]: walking through quoted example files

pub mod commands;
pub mod condition;
pub mod macros;
pub mod openedlist;
pub mod parser;
pub mod quoter;

pub use commands::Command;
pub use condition::Condition;
pub use macros::{Macro, MacroTable};
pub use openedlist::{ListStyle, OpenedList};
pub use parser::{is_auto_link_string, DocParser};
pub use quoter::{DirectoryResolver, FileResolver, LineQuoter, Quoter};
