pub mod factory;

pub use factory::FwfFactory;
