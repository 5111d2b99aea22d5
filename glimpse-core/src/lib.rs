//! Feed assembly and post mutation, independent of any particular database or media host.
//!
//! Both halves are generic over [`store::Store`] and, for uploads, [`media::MediaHost`]; the
//! HTTP layer picks the concrete implementations.

pub mod error;
pub mod feed;
pub mod media;
pub mod mutation;
pub mod store;

#[cfg(test)]
mod memory;
