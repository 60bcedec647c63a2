pub mod filter;
pub mod ibus;
