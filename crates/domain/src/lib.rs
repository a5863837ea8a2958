pub mod error;
pub mod genre;
pub mod media;
pub mod result;

pub use crate::error::DomainError;
pub use crate::genre::{Genre, NUM_GENRES};
pub use crate::media::MediaKind;
pub use crate::result::{ClassificationResponse, ClassificationResult, GenreScore};
