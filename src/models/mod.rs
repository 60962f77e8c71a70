mod page;
mod post;
mod remixable;
mod story;

pub use page::{NewSitemapUrl, PageCandidate, SitemapUrl};
pub use post::{NewPost, Post, PostListing};
pub use remixable::{NewRemixable, Remixable, RemixableImage};
pub use story::{NewSource, NewStory, Source, Story};
