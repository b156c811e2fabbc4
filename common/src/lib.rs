pub mod balance;
pub mod config;
pub mod crypto;
pub mod currency;
pub mod fees;
pub mod genesis;
pub mod governance;
pub mod serializer;
pub mod swap;
pub mod tracker;
pub mod transaction;
