pub mod cleanup;
pub mod engine;
pub mod manifest;
pub mod paths;
pub mod remote;
pub mod transfer;
pub mod tree;
