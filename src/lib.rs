#[macro_use] extern crate derive_more;
#[macro_use] extern crate log;
#[macro_use] extern crate serde_derive;

pub mod delegations;
pub mod fetch;
pub mod report;
