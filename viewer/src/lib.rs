//! Headless front end for the hyperorbit engine: command-line options, logging setup and
//! PNG export of window surfaces.
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::dbg_macro, clippy::large_enum_variant)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod cli;
pub mod export;
pub mod logging;
