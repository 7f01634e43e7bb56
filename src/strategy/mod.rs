pub mod cross_group;
pub mod group;
