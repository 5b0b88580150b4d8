//! Transports connecting the in-process bus to the outside world.

pub(crate) mod stdio;
