//! Git access: a per-repository adapter and the tree of nested repositories
//! the packages live in.
pub mod repo;
pub mod tree;
