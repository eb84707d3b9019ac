mod article;
mod feed;

pub use article::{escape_url, Article, CommentLink, NewArticle, Tag};
pub use feed::{site_url, Feed, FeedUpdate};
