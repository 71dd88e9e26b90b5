#![doc = include_str!("../README.md")]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod bson_util;
pub mod change_stream;
pub mod coll;
pub mod collation;
pub mod concern;
pub mod cursor;
mod facade;
pub mod error;
pub mod selection_criteria;
pub mod session;

pub use crate::{
    change_stream::{
        event::ChangeStreamEvent, options::ChangeStreamOptions, session::SessionChangeStream,
        ChangeStream,
    },
    error::{Error, ErrorKind, Result},
    facade::{Client, Collection, Database},
};
