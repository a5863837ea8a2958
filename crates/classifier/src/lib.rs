pub mod error;
pub mod layers;
pub mod model;
pub mod pipeline;
pub mod pool;
pub mod ranking;
pub mod staging;

pub use error::{ClassifyError, ModelError, PoolError};
pub use model::{GenreCnn, GenreModel, Logits, DEFAULT_MODEL_PATH};
pub use pipeline::ClassificationService;
pub use pool::ClassificationPool;
pub use ranking::{rank_top_k, softmax, TOP_K};
