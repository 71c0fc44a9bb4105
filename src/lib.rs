//! Boxhalo decomposes a rectangular, structured index space into equal
//! disjoint boxes, distributes the boxes over a group of processes, and fills
//! the ghost (halo) cells around each box from its neighbors. Neighbors may
//! live on the same process, in which case ghost data is copied directly, or
//! on another process, in which case it is packed into a buffer and sent as a
//! tagged message. Periodic domains are supported on any subset of axes.
//!
//! The usual sequence is to build a `Layout` from a domain, a maximum box
//! size, and a `Topology`; allocate a `BlockArray` on it; build an
//! `ExchangePattern` once; and call `BlockArray::exchange` whenever the ghost
//! cells need refreshing.

pub mod block_array;
pub mod config;
pub mod data_block;
pub mod error;
pub mod exchange;
pub mod index_vector;
pub mod layout;
pub mod message;
pub mod region;
pub mod topology;
pub mod traversal;

pub use block_array::BlockArray;
pub use data_block::{CellValue, DataBlock};
pub use error::{Error, Result};
pub use exchange::{ExchangePattern, Motion, WaitDiscipline};
pub use index_vector::IndexVector;
pub use layout::{BoxHandle, Layout};
pub use region::Region;
pub use topology::Topology;
pub use traversal::{Periodicity, Trim};
