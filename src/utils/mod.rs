pub mod wildcard;

pub use wildcard::Wildcard;
