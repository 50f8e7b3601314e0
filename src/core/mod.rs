pub mod case;
pub mod instructions;
pub mod llm;
pub mod prompts;
pub mod realtime;

// Re-export commonly used types for convenience
pub use case::{CaseRecord, ConversationMessage, DialectLevel, MessageRole};
pub use instructions::{build_instructions, dialect_directive};

pub use llm::{
    ChatCompletion, ChatMessage, ChatRequest, ChatSettings, LlmError, LlmResult, OpenAIChatClient,
    SharedChatCompletion,
};

pub use realtime::{
    BaseRealtime, BoxedRealtime, OpenAIRealtime, RealtimeConfig, RealtimeError, RealtimeEvent,
    RealtimeResult, RealtimeVendor, VendorProfile, create_realtime_provider,
    get_supported_realtime_vendors,
};
