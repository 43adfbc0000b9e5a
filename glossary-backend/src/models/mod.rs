mod tag;
mod term;

pub use tag::Tag;
pub use term::{Term, TermInput};
