mod articles;
mod schema;
mod store;
mod types;

pub use schema::Database;
pub use store::ArticleStore;
pub use types::{Article, DatabaseError, StoredArticle, UNTITLED};
