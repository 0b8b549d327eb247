//! copymedia: match downloaded media files against configured series
//! patterns, rename and relocate them into a destination library, and
//! classify and process stand-alone movies.

pub mod cli;
pub mod config;
pub mod error;
pub mod matcher;
pub mod meta;
pub mod movie;
pub mod notify;
pub mod run;
pub mod tmdb;
