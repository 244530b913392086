pub mod pricing;
pub mod text;
