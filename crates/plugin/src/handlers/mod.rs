#![forbid(unsafe_code)]

pub(crate) mod comments;
mod dispatch;
pub(crate) mod votes;

pub(crate) use dispatch::dispatch;
