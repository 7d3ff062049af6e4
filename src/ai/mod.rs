mod generator;
mod prompt;

pub use generator::Generator;
pub use prompt::truncate_chars;
