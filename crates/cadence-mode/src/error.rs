use cadence_core::ModeId;
use thiserror::Error;

/// Tree-construction errors reported by [`TreeBuilder::build`](crate::TreeBuilder::build).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModeError {
    #[error("too many modes: {0} declared, at most {max} supported", max = u16::MAX)]
    TooManyModes(usize),

    #[error("mode `{mode}` refers to undeclared {what} {id}")]
    Dangling {
        mode: &'static str,
        id:   ModeId,
        what: &'static str,
    },

    #[error("mode `{mode}` lists child `{child}` more than once")]
    DuplicateChild {
        mode:  &'static str,
        child: &'static str,
    },

    #[error("idle mode `{idle}` of `{mode}` is not one of its children")]
    IdleNotChild {
        mode: &'static str,
        idle: &'static str,
    },

    #[error("mode `{0}` is an idle target and also has a follow mode")]
    IdleFollower(&'static str),

    #[error("mode `{0}` follows itself")]
    SelfFollow(&'static str),

    #[error("mode `{0}` is its own ancestor")]
    Cycle(&'static str),

    #[error("mode `{mode}` has invalid storage tag `{tag}` (1-5 ASCII alphanumerics expected)")]
    InvalidStorageTag {
        mode: &'static str,
        tag:  String,
    },
}

pub type ModeResult<T> = Result<T, ModeError>;
