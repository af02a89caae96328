#![warn(
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_qualifications
)]
#![allow(clippy::enum_variant_names, clippy::type_complexity)]

pub mod cli;
pub mod filter;
pub mod paths_file;
mod pipe;
pub mod probe;
pub mod svn;
