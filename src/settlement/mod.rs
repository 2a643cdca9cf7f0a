pub mod engine;
pub mod notary;
