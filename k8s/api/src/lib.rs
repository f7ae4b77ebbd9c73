#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

//! The dynamic edge of the controller: the closed catalog of watched resource
//! kinds and the typed extractors over untyped object data. Everything above
//! this crate sees only typed values.

mod kinds;
pub mod value;

pub use self::kinds::{dynamic_api, Error, ResourceKind};
