mod lister;
mod title;

pub use lister::YouTubeLister;
pub use title::{clean_title, source_url};
