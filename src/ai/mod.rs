mod client;
mod image;
mod matcher;
mod scorer;
mod writer;

pub use client::{AzureOpenAi, ChatModel};
pub use image::{AzureImageClient, ImageGenerator};
pub use matcher::choose_page;
pub use scorer::{assign_relevance_scores, ScoredStory};
pub use writer::{generate_post_content, poster_prompt, remix_content};

#[cfg(test)]
pub(crate) use client::tests::ScriptedModel;
#[cfg(test)]
pub(crate) use image::tests::FakeImages;
