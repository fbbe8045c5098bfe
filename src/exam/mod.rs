//! Domain core: answer-key normalization, the session state machine,
//! the session-local answer store and the result presenter. Pure code,
//! no I/O; the surrounding layers feed it.

pub(crate) mod answers;
pub(crate) mod correction;
pub(crate) mod keys;
pub(crate) mod normalizer;
pub(crate) mod scoring;
pub(crate) mod session;
