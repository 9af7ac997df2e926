//! integrated tests
pub mod toolkit;

mod cnav;
mod galileo;
mod glonass;
mod lnav;
mod store;
