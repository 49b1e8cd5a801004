//! Plugins shipped with the blog.

mod hello_world;
mod search_box;
mod toc;

pub use hello_world::hello_world;
pub use search_box::search_box;
pub use toc::table_of_contents;
