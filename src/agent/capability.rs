//! The fixed capability set — a tagged union dispatched by the orchestrator.
//!
//! Dynamic tool discovery is deliberately absent: the orchestrator
//! advertises these six tools to the model and parses its invocations back
//! into this enum.

use serde::Deserialize;
use serde_json::json;

use crate::llm::{ToolCall, ToolDefinition};

/// A capability invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub enum Capability {
    /// Return the user's configured top feeds.
    ListSources,
    /// Read a feed and list its articles regardless of interest.
    ReadFeed {
        url: String,
        max_articles: Option<usize>,
    },
    /// Read recent articles from one feed (or all configured feeds) and
    /// keep the ones matching the preference profile.
    Triage { url: Option<String> },
    /// Summarize articles from the most recent listing, by number.
    /// An empty list means the whole listing.
    Summarize { articles: Vec<usize> },
    /// Merge the queued entries into the destination document.
    Publish,
    /// Email the queued digest to the user.
    Email { subject: Option<String> },
}

impl Capability {
    /// Parse a model tool call.
    ///
    /// The error string is handed back to the model as the tool result; it
    /// never aborts the session.
    pub fn from_tool_call(call: &ToolCall) -> Result<Self, String> {
        match call.name.as_str() {
            "get_user_sources" => Ok(Self::ListSources),
            "read_rss" => {
                #[derive(Deserialize)]
                struct Args {
                    url: String,
                    num_articles: Option<usize>,
                }
                let args: Args = parse_args(call)?;
                Ok(Self::ReadFeed {
                    url: args.url,
                    max_articles: args.num_articles,
                })
            }
            "read_and_triage" => {
                #[derive(Deserialize)]
                struct Args {
                    url: Option<String>,
                }
                let args: Args = parse_args(call)?;
                Ok(Self::Triage { url: args.url })
            }
            "summarize_articles" => {
                #[derive(Deserialize)]
                struct Args {
                    #[serde(default)]
                    articles: Vec<usize>,
                }
                let args: Args = parse_args(call)?;
                Ok(Self::Summarize {
                    articles: args.articles,
                })
            }
            "update_reading_list" => Ok(Self::Publish),
            "send_email" => {
                #[derive(Deserialize)]
                struct Args {
                    subject: Option<String>,
                }
                let args: Args = parse_args(call)?;
                Ok(Self::Email {
                    subject: args.subject,
                })
            }
            other => Err(format!("unknown tool: {other}")),
        }
    }

    /// Tool schema advertised to the model.
    pub fn definitions() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "get_user_sources".to_string(),
                description: "Get this user's top RSS feeds for reading. Only call this \
                    tool if the user does not specify a feed URL in the query."
                    .to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            },
            ToolDefinition {
                name: "read_rss".to_string(),
                description: "Read articles from an RSS feed and list them regardless of \
                    potential interest. Returns at most num_articles articles; by default \
                    all articles in the feed."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "url": {"type": "string", "description": "Feed URL"},
                        "num_articles": {"type": "integer", "minimum": 1}
                    },
                    "required": ["url"]
                }),
            },
            ToolDefinition {
                name: "read_and_triage".to_string(),
                description: "Read recent articles from an RSS feed and keep only the \
                    ones interesting to the user. Omit url to triage all of the user's \
                    top feeds."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "url": {"type": "string", "description": "Feed URL"}
                    }
                }),
            },
            ToolDefinition {
                name: "summarize_articles".to_string(),
                description: "Summarize articles from the most recent listing and queue \
                    them as reading-list entries. Pass the article numbers to summarize, \
                    or no numbers for the whole listing."
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "articles": {
                            "type": "array",
                            "items": {"type": "integer", "minimum": 1},
                            "description": "1-based numbers from the last listing"
                        }
                    }
                }),
            },
            ToolDefinition {
                name: "update_reading_list".to_string(),
                description: "Merge the queued entries into the remote reading list. \
                    Call only after summarize_articles has queued entries."
                    .to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            },
            ToolDefinition {
                name: "send_email".to_string(),
                description: "Email the queued digest to the user.".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "subject": {"type": "string"}
                    }
                }),
            },
        ]
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(call: &ToolCall) -> Result<T, String> {
    serde_json::from_value(call.arguments.clone())
        .map_err(|e| format!("invalid arguments for {}: {e}", call.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    #[test]
    fn test_parse_read_rss() {
        let parsed = Capability::from_tool_call(&call(
            "read_rss",
            json!({"url": "https://example.com/rss", "num_articles": 5}),
        ))
        .unwrap();
        assert_eq!(
            parsed,
            Capability::ReadFeed {
                url: "https://example.com/rss".to_string(),
                max_articles: Some(5),
            }
        );
    }

    #[test]
    fn test_parse_triage_without_url() {
        let parsed = Capability::from_tool_call(&call("read_and_triage", json!({}))).unwrap();
        assert_eq!(parsed, Capability::Triage { url: None });
    }

    #[test]
    fn test_parse_summarize_defaults_to_whole_listing() {
        let parsed =
            Capability::from_tool_call(&call("summarize_articles", json!({}))).unwrap();
        assert_eq!(parsed, Capability::Summarize { articles: vec![] });

        let parsed = Capability::from_tool_call(&call(
            "summarize_articles",
            json!({"articles": [2, 3]}),
        ))
        .unwrap();
        assert_eq!(
            parsed,
            Capability::Summarize {
                articles: vec![2, 3]
            }
        );
    }

    #[test]
    fn test_parse_argument_free_tools() {
        assert_eq!(
            Capability::from_tool_call(&call("get_user_sources", json!({}))).unwrap(),
            Capability::ListSources
        );
        assert_eq!(
            Capability::from_tool_call(&call("update_reading_list", json!({}))).unwrap(),
            Capability::Publish
        );
    }

    #[test]
    fn test_unknown_tool_rejected() {
        let err = Capability::from_tool_call(&call("launch_rocket", json!({}))).unwrap_err();
        assert!(err.contains("unknown tool"));
    }

    #[test]
    fn test_bad_arguments_rejected() {
        let err =
            Capability::from_tool_call(&call("read_rss", json!({"num_articles": 5}))).unwrap_err();
        assert!(err.contains("read_rss"));
    }

    #[test]
    fn test_definitions_cover_every_capability() {
        let names: Vec<String> = Capability::definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "get_user_sources",
                "read_rss",
                "read_and_triage",
                "summarize_articles",
                "update_reading_list",
                "send_email"
            ]
        );
    }
}
