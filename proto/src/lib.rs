//! Protocol bindings shared between the directory client and the
//! authentication strategy. These types define the wire contract with the
//! user-pool directory service and carry no IO of their own.

#![deny(warnings)]
#![warn(unused_extern_crates)]

pub mod constants;
pub mod v1;
