pub mod answer;
pub mod gemini;
pub mod retrieval;
pub mod side_effects;

pub use answer::{AnswerComposer, GenerationProvider};
pub use gemini::GeminiService;
pub use retrieval::{
    EmbeddingProvider, FallbackRetriever, KeywordRetriever, Retriever, VectorIndex,
    VectorRetriever,
};
pub use side_effects::{Ledger, Notifier, RegistrationSummary, SideEffects};
