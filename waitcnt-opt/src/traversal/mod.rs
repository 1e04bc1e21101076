//! Helpers for traversing the blocks of a program
mod action;
mod construct;
mod visitor;

pub use action::{Action, VisResult};
pub use construct::{ConstructVisitor, Named, ParseVal, PassOpt};
pub use visitor::Visitor;
