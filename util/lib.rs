/*!
This crate holds small helpers shared by the other crates in the workspace.
*/

#![allow(clippy::tabs_in_doc_comments)]

pub mod table;
