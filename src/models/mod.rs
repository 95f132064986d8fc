pub mod forecast;
pub mod terrain;
pub mod thermal;
