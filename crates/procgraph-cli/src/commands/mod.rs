pub mod check;
pub mod convert;
pub mod nodes;
pub mod run;
