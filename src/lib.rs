#![doc = include_str!("../README.md")]
#[cfg(test)]
extern crate approx;

pub mod codec;
pub mod config;
pub mod env;
pub mod reward;
pub mod seeding;
pub mod spaces;
pub mod terminal;
pub mod transition;
