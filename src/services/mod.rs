pub(crate) mod correction;
pub(crate) mod generation;
pub(crate) mod rendezvous;
