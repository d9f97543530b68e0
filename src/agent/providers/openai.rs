//! `OpenAI` provider implementation using the `async-openai` crate.
//!
//! Supports any `OpenAI`-compatible API (`OpenAI`, Azure, local proxies)
//! via the base URL override in [`EngineConfig`].

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionNamedToolChoice,
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestToolMessage,
    ChatCompletionRequestToolMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, ChatCompletionTool, ChatCompletionToolChoiceOption,
    ChatCompletionToolType, CreateChatCompletionRequest, FunctionCall, FunctionName,
    FunctionObject,
};
use async_trait::async_trait;

use crate::agent::config::EngineConfig;
use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
use crate::agent::provider::LlmProvider;
use crate::agent::tool::ToolCall;
use crate::error::ResearchError;

/// `OpenAI`-compatible LLM provider.
///
/// Wraps the `async-openai` client for chat completions. Compatible
/// with any API that follows the `OpenAI` chat completion spec.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Creates a new provider from engine configuration.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);

        if let Some(ref base_url) = config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Self {
            client: Client::with_config(openai_config),
        }
    }

    /// Lowers one of our chat messages into the SDK's request message.
    ///
    /// System, user, and tool messages are plain text carriers; the
    /// assistant arm also replays the tool calls the loop appended to
    /// the transcript.
    fn to_sdk_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        let text = msg.content.clone();
        match msg.role {
            Role::System => ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(text),
                name: None,
            }
            .into(),
            Role::User => ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(text),
                name: None,
            }
            .into(),
            Role::Assistant => Self::to_sdk_assistant(msg),
            Role::Tool => ChatCompletionRequestToolMessage {
                content: ChatCompletionRequestToolMessageContent::Text(text),
                tool_call_id: msg.tool_call_id.clone().unwrap_or_default(),
            }
            .into(),
        }
    }

    fn to_sdk_assistant(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        let replayed: Vec<ChatCompletionMessageToolCall> = msg
            .tool_calls
            .iter()
            .map(|call| ChatCompletionMessageToolCall {
                id: call.id.clone(),
                r#type: ChatCompletionToolType::Function,
                function: FunctionCall {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                },
            })
            .collect();

        #[allow(deprecated)]
        ChatCompletionRequestAssistantMessage {
            content: (!msg.content.is_empty())
                .then(|| ChatCompletionRequestAssistantMessageContent::Text(msg.content.clone())),
            tool_calls: (!replayed.is_empty()).then_some(replayed),
            name: None,
            refusal: None,
            audio: None,
            function_call: None,
        }
        .into()
    }

    /// Builds an `OpenAI` chat completion request from our generic
    /// request, including a forced named tool choice when the step
    /// controller demands one.
    fn build_request(request: &ChatRequest) -> CreateChatCompletionRequest {
        let offered: Vec<ChatCompletionTool> = request
            .tools
            .iter()
            .map(|def| ChatCompletionTool {
                r#type: ChatCompletionToolType::Function,
                function: FunctionObject {
                    name: def.name.clone(),
                    description: Some(def.description.clone()),
                    parameters: Some(def.parameters.clone()),
                    strict: None,
                },
            })
            .collect();

        let forced = request.tool_choice.as_ref().map(|name| {
            ChatCompletionToolChoiceOption::Named(ChatCompletionNamedToolChoice {
                r#type: ChatCompletionToolType::Function,
                function: FunctionName { name: name.clone() },
            })
        });

        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(Self::to_sdk_message).collect(),
            temperature: request.temperature.filter(|&t| t != 0.0),
            max_completion_tokens: request.max_tokens,
            tools: (!offered.is_empty()).then_some(offered),
            tool_choice: forced,
            ..Default::default()
        }
    }

    /// Maps a completion response back to our generic response type.
    fn convert_response(
        response: async_openai::types::CreateChatCompletionResponse,
    ) -> ChatResponse {
        let choice = response.choices.first();

        let content = choice
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .unwrap_or_default();

        let tool_calls = choice
            .and_then(|c| c.message.tool_calls.as_ref())
            .map(|tcs| {
                tcs.iter()
                    .map(|tc| ToolCall {
                        id: tc.id.clone(),
                        name: tc.function.name.clone(),
                        arguments: tc.function.arguments.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let finish_reason = choice.and_then(|c| {
            c.finish_reason
                .as_ref()
                .map(|fr| format!("{fr:?}").to_lowercase())
        });

        let usage = response
            .usage
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

        ChatResponse {
            content,
            usage,
            tool_calls,
            finish_reason,
        }
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<async-openai::Client>")
            .finish()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ResearchError> {
        let openai_request = Self::build_request(request);

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(|e| ResearchError::ApiRequest {
                message: e.to_string(),
                status: None,
            })?;

        Ok(Self::convert_response(response))
    }

    async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        max_output_tokens: u32,
    ) -> Result<ChatResponse, ResearchError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![crate::agent::message::user_message(prompt)],
            temperature: None,
            max_tokens: Some(max_output_tokens),
            tools: Vec::new(),
            tool_choice: None,
        };
        self.chat(&request).await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message;
    use crate::agent::tool::ToolDefinition;

    fn test_config() -> EngineConfig {
        EngineConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_provider_construction() {
        let provider = OpenAiProvider::new(&test_config());
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_system_and_tool_messages_lowered() {
        let lowered = OpenAiProvider::to_sdk_message(&message::system_message("test"));
        assert!(matches!(lowered, ChatCompletionRequestMessage::System(_)));

        let lowered =
            OpenAiProvider::to_sdk_message(&message::tool_message("call_123", "result data"));
        assert!(matches!(lowered, ChatCompletionRequestMessage::Tool(_)));
    }

    #[test]
    fn test_assistant_replays_tool_calls_without_empty_text() {
        let msg = message::assistant_tool_calls_message(
            String::new(),
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "search".to_string(),
                arguments: r#"{"query":"rust"}"#.to_string(),
            }],
        );
        let ChatCompletionRequestMessage::Assistant(assistant) =
            OpenAiProvider::to_sdk_message(&msg)
        else {
            panic!("expected an assistant message");
        };
        assert_eq!(assistant.tool_calls.as_ref().map_or(0, Vec::len), 1);
        assert!(assistant.content.is_none(), "empty text must be elided");
    }

    #[test]
    fn test_build_request_with_tools() {
        let request = ChatRequest {
            model: "gpt-5.2-2025-12-11".to_string(),
            messages: vec![message::user_message("test")],
            temperature: Some(0.1),
            max_tokens: Some(100),
            tools: vec![ToolDefinition {
                name: "search".to_string(),
                description: "Search the web".to_string(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            }],
            tool_choice: None,
        };
        let built = OpenAiProvider::build_request(&request);
        assert!(built.tools.is_some());
        assert!(built.tool_choice.is_none());
    }

    #[test]
    fn test_build_request_forced_tool_choice() {
        let request = ChatRequest {
            model: "gpt-5.2-2025-12-11".to_string(),
            messages: vec![message::user_message("test")],
            temperature: Some(0.1),
            max_tokens: Some(100),
            tools: vec![ToolDefinition {
                name: "scrape".to_string(),
                description: "Scrape a URL".to_string(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            }],
            tool_choice: Some("scrape".to_string()),
        };
        let built = OpenAiProvider::build_request(&request);
        match built.tool_choice {
            Some(ChatCompletionToolChoiceOption::Named(named)) => {
                assert_eq!(named.function.name, "scrape");
            }
            other => panic!("Expected named tool choice, got {other:?}"),
        }
    }

    #[test]
    fn test_build_request_zero_temperature_elided() {
        let request = ChatRequest {
            model: "gpt-5.2-2025-12-11".to_string(),
            messages: vec![message::user_message("test")],
            temperature: Some(0.0),
            max_tokens: None,
            tools: Vec::new(),
            tool_choice: None,
        };
        let built = OpenAiProvider::build_request(&request);
        assert!(built.temperature.is_none());
    }
}
