use crate::token::{Pos, WithPos};
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Encountered \"{}\" on {}.\n{}", found.inner, found.pos, expected)]
    Syntax {
        found: WithPos<String>,
        expected: String,
    },
    #[error("Encountered \"/\" on {}.\nDivision by constant zero", .0)]
    DivideByZero(Pos),
    #[error("Encountered \"{}\" on {}.\nInteger literal out of range", .0.inner, .0.pos)]
    IntegerOutOfRange(WithPos<String>),
    #[error("{}", .0)]
    Io(#[from] io::Error),
}
