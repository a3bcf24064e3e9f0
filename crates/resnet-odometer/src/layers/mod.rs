//! Common low-level modules for building the residual networks in Burn.
pub mod blocks;
pub mod conv;
pub mod init;
pub mod squeeze_excite;
