//! # statedoc
//!
//! A crash-resilient, journaled document store. A [`JournaledDocument`]
//! holds a JSON-shaped [`Value`] tree, appends every mutation to a
//! memory-mapped journal stream before applying it in memory, and
//! periodically folds the journal into a JSON snapshot so that recovery
//! after a crash never has to replay more than the commands written since
//! the last fold.

#![deny(missing_docs)]

#[macro_use]
extern crate log;

mod command;
mod document;
mod error;
mod journal;
mod path;
mod recovery;
mod snapshot;
mod stream;
mod value;

pub use command::Command;
pub use document::{document_exists, load_document_contents, DocumentConfig, JournaledDocument};
pub use error::{DocumentError, Result};
pub use path::Directive;
pub use value::Value;
