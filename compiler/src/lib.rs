pub mod ir;
pub mod logging;
pub mod passes;
pub mod recipe;
pub mod session;
pub mod units;
