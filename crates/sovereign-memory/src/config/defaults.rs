//! Default values for Sovereign Memory configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Storage Defaults
// ============================================================================

/// Default base directory for persisted data.
pub const DEFAULT_DATA_DIR: &str = ".sovereign";

/// Default name of the embedded database directory inside the data dir.
pub const DEFAULT_DB_FILE: &str = "memory.db";

// ============================================================================
// Embedding Defaults
// ============================================================================

/// Embedding dimension fixed at store creation.
pub const DEFAULT_EMBEDDING_DIM: usize = 128;

/// Maximum number of characters sent to the embedding endpoint.
pub const DEFAULT_MAX_EMBED_INPUT_CHARS: usize = 1500;

/// Characters of code included in a record's embedding text.
pub const DEFAULT_EMBED_CODE_CHARS: usize = 500;

// ============================================================================
// LLM Defaults
// ============================================================================

/// Default LLM provider.
pub const DEFAULT_LLM_PROVIDER: &str = "openai";

/// Default OpenAI-compatible API URL.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default Ollama URL (OpenAI-compatible endpoint).
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/v1";

/// Default chat model for OpenAI.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// Default embedding model for OpenAI.
pub const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default chat model for Ollama.
pub const DEFAULT_OLLAMA_MODEL: &str = "phi4";

/// Default embedding model for Ollama.
pub const DEFAULT_OLLAMA_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Maximum tokens for chat responses.
pub const DEFAULT_MAX_TOKENS: u32 = 2048;

/// Sampling temperature for interactive answers.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

// ============================================================================
// Retrieval Defaults
// ============================================================================

/// Number of nearest records fetched by similarity search.
pub const DEFAULT_TOP_K: usize = 5;

/// Breadth-first expansion depth.
pub const DEFAULT_MAX_HOPS: usize = 2;

/// Neighbors fetched per frontier node and hop.
pub const DEFAULT_MAX_NEIGHBORS_PER_HOP: usize = 5;

/// Character budget of the formatted context block.
pub const DEFAULT_CONTEXT_MAX_CHARS: usize = 3000;

/// Characters of code shown per result before truncation.
pub const DEFAULT_CODE_PREVIEW_CHARS: usize = 500;

// ============================================================================
// Ingest Defaults
// ============================================================================

/// Rows per committed window in bulk writes.
pub const DEFAULT_BATCH_WINDOW: usize = 5000;
