pub(crate) mod activation;
pub(crate) mod cache;
pub(crate) mod network;
pub(crate) mod trace;
pub(crate) mod writer;
