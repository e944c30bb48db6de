//! This is a library that provides objects and functionality to help you manage
//! a collection of songified notes inside of a database. Users own notes and
//! collections of notes; a collection keeps an ordered list of references to
//! notes, and every ownership-sensitive mutation is gated by an access-control
//! check.

pub mod access;
pub mod collection;
pub mod database;
pub mod error;
pub mod loadable;
pub mod note;
pub mod query;
pub mod user;

pub use database::Database;
pub use error::Error;
pub use error::Result;
