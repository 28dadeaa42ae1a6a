pub mod description;

pub use description::{format_description, DescriptionBlock};
