pub mod language;

pub use language::filter_non_english;
