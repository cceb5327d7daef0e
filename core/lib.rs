/*!
This crate implements the drug sensitivity pipeline: it splits a dataset into training and test rows, encodes the categorical columns under several strategies without letting information from the test rows or from a row's own target leak into the features, fits regression models to the encoded rows, and ranks the results.

The pipeline is made of three steps, each persisting its output for the next. See the [`pipeline`](pipeline/index.html) module.
*/

#![allow(clippy::tabs_in_doc_comments)]

pub mod config;
mod error;
pub mod pipeline;
pub mod runner;
mod split;
pub mod strategy;

pub use self::config::Config;
pub use self::error::{Error, ErrorKind};
pub use self::split::{split, Split, SplitRecord};
